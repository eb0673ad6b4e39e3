//! LIFO ledger of reversal operations.
//!
//! Every handler that successfully mutates remote state pushes exactly one
//! entry describing how to take that mutation back. Entries are tagged data,
//! not closures, so the stack stays inspectable and the post-finalize
//! sentinel is an explicit variant.

/// One recorded reversal. Popped before execution; executed at most once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompensatingAction {
    /// Undo a login: log out and return to the login menu.
    Login,
    DeletePackage {
        package_id: String,
    },
    DeleteFile {
        package_id: String,
        root_directory_id: String,
        file_id: String,
        name: String,
    },
    RemoveRecipient {
        package_id: String,
        recipient_id: String,
        email: String,
    },
    /// Sentinel left behind by finalize. Executing it only reports that a
    /// finalized package cannot be taken back.
    Unfinalizable,
}

impl CompensatingAction {
    pub fn label(&self) -> String {
        match self {
            CompensatingAction::Login => "undo login".to_string(),
            CompensatingAction::DeletePackage { package_id } => {
                format!("delete package {package_id}")
            }
            CompensatingAction::DeleteFile { name, .. } => format!("delete file '{name}'"),
            CompensatingAction::RemoveRecipient { email, .. } => {
                format!("remove recipient '{email}'")
            }
            CompensatingAction::Unfinalizable => "finalized package".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CompensatingActionStack {
    entries: Vec<CompensatingAction>,
}

impl CompensatingActionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: CompensatingAction) {
        self.entries.push(action);
    }

    /// Remove and return the most recent entry. The entry leaves the stack
    /// before it is executed, so a reversal that fails is never retried.
    pub fn pop(&mut self) -> Option<CompensatingAction> {
        self.entries.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Discard every pending reversal without executing any of them. Used on
    /// finalize and logout, where reversibility intentionally ends.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(email: &str) -> CompensatingAction {
        CompensatingAction::RemoveRecipient {
            package_id: "pkg".to_string(),
            recipient_id: format!("r-{email}"),
            email: email.to_string(),
        }
    }

    #[test]
    fn pops_in_reverse_push_order() {
        let mut stack = CompensatingActionStack::new();
        stack.push(recipient("a@example.com"));
        stack.push(recipient("b@example.com"));
        stack.push(recipient("c@example.com"));

        assert_eq!(stack.pop(), Some(recipient("c@example.com")));
        assert_eq!(stack.pop(), Some(recipient("b@example.com")));
        assert_eq!(stack.pop(), Some(recipient("a@example.com")));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn clear_discards_everything() {
        let mut stack = CompensatingActionStack::new();
        stack.push(CompensatingAction::Login);
        stack.push(recipient("a@example.com"));
        assert_eq!(stack.len(), 2);

        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn labels_name_the_reversal() {
        assert_eq!(
            recipient("a@example.com").label(),
            "remove recipient 'a@example.com'"
        );
        assert_eq!(
            CompensatingAction::DeletePackage {
                package_id: "pkg-1".to_string()
            }
            .label(),
            "delete package pkg-1"
        );
    }
}
