//! Signed-in participant for the current session.
//!
//! The identity comes from an external login step; the board only needs to
//! know who is acting and to refuse authoring when nobody is signed in.

use crate::model::note::Author;
use log::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    participant: Option<Author>,
}

impl Session {
    pub fn signed_in(author: Author) -> Self {
        Self {
            participant: Some(author),
        }
    }

    pub fn login(&mut self, author: Author) {
        self.participant = Some(author);
        info!("event=session_login module=session status=ok author={author}");
    }

    /// Clears the identity. Returns the participant that was signed in.
    pub fn logout(&mut self) -> Option<Author> {
        let previous = self.participant.take();
        if let Some(author) = previous {
            info!("event=session_logout module=session status=ok author={author}");
        }
        previous
    }

    pub fn participant(&self) -> Option<Author> {
        self.participant
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::model::note::Author;

    #[test]
    fn logout_returns_previous_participant_once() {
        let mut session = Session::signed_in(Author::Xu);
        assert_eq!(session.logout(), Some(Author::Xu));
        assert_eq!(session.logout(), None);
        assert_eq!(session.participant(), None);
    }
}
