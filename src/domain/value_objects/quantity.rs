use crate::domain::errors::ValidationError;

/// Whole option contract count. A position never holds fewer than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Contracts(u32);

impl Contracts {
    pub fn new(count: u32) -> Result<Self, ValidationError> {
        if count == 0 {
            return Err(ValidationError::InvalidQuantity(
                "contract count must be at least 1".to_string(),
            ));
        }
        Ok(Contracts(count))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Reduce the count by a scale-out. Fails if the remainder would be zero;
    /// a full close destroys the position instead of reducing it.
    pub fn reduce(&self, sold: u32) -> Result<Self, ValidationError> {
        if sold >= self.0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "cannot scale out {} of {} contracts",
                sold, self.0
            )));
        }
        Ok(Contracts(self.0 - sold))
    }
}

impl std::fmt::Display for Contracts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contracts_new_valid() {
        assert_eq!(Contracts::new(84).unwrap().get(), 84);
    }

    #[test]
    fn test_contracts_new_zero() {
        assert!(Contracts::new(0).is_err());
    }

    #[test]
    fn test_reduce() {
        let q = Contracts::new(84).unwrap();
        assert_eq!(q.reduce(21).unwrap().get(), 63);
    }

    #[test]
    fn test_reduce_to_zero_rejected() {
        let q = Contracts::new(10).unwrap();
        assert!(q.reduce(10).is_err());
        assert!(q.reduce(11).is_err());
    }
}
