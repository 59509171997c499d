// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use uuid::Uuid;

/// Process identity stamped on every published message as `sender_id`.
///
/// Generated once per process and shared by the publisher and the message
/// handler, which uses it to recognise messages that looped back from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierGenerator {
    identifier: String,
}

impl IdentifierGenerator {
    pub fn new() -> IdentifierGenerator {
        IdentifierGenerator {
            identifier: Uuid::new_v4().to_string(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_own(&self, sender_id: &str) -> bool {
        self.identifier == sender_id
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        IdentifierGenerator::new()
    }
}

impl From<&str> for IdentifierGenerator {
    fn from(identifier: &str) -> Self {
        IdentifierGenerator {
            identifier: identifier.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_unique_and_stable() {
        let first = IdentifierGenerator::new();
        let second = IdentifierGenerator::new();

        assert_ne!(first.identifier(), second.identifier());
        assert_eq!(first.identifier(), first.identifier());
        assert!(Uuid::parse_str(first.identifier()).is_ok());
    }

    #[test]
    fn recognises_own_sender_id() {
        let generator = IdentifierGenerator::from("proc-1");

        assert!(generator.is_own("proc-1"));
        assert!(!generator.is_own("other-proc"));
    }
}
