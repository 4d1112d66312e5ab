use std::collections::HashMap;

use crate::error::WorldError;

use super::UserId;

/// Which account has which user online. Names compare case-insensitively.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    online: HashMap<String, UserId>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    pub fn open(&mut self, name: &str, user: UserId) -> Result<(), WorldError> {
        let key = Self::key(name);
        if self.online.contains_key(&key) {
            return Err(WorldError::AccountInUse(name.to_string()));
        }
        self.online.insert(key, user);
        Ok(())
    }

    pub fn close(&mut self, name: &str, user: UserId) -> bool {
        let key = Self::key(name);
        match self.online.get(&key) {
            Some(&holder) if holder == user => {
                self.online.remove(&key);
                true
            }
            Some(&holder) => {
                log::error!("Account {} is held by {}, not {}", name, holder, user);
                false
            }
            None => false,
        }
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.online.contains_key(&Self::key(name))
    }

    pub fn user_of(&self, name: &str) -> Option<UserId> {
        self.online.get(&Self::key(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_user_per_account() {
        let mut accounts = AccountRegistry::new();
        accounts.open("Alice", UserId(1)).unwrap();
        assert!(matches!(
            accounts.open("alice", UserId(2)),
            Err(WorldError::AccountInUse(_))
        ));
        assert_eq!(accounts.user_of("ALICE"), Some(UserId(1)));
    }

    #[test]
    fn close_requires_holder() {
        let mut accounts = AccountRegistry::new();
        accounts.open("Bob", UserId(3)).unwrap();
        assert!(!accounts.close("Bob", UserId(4)));
        assert!(accounts.is_online("bob"));
        assert!(accounts.close("bob", UserId(3)));
        assert!(accounts.is_empty());
    }
}
