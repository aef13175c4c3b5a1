use serde::Deserialize;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct Limit {
    pub limit: Option<usize>,
}

impl Limit {
    /// Defaults to 10; clamped into `1..=50`.
    pub fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(Limit { limit: None }.resolve(), 10);
        assert_eq!(Limit { limit: Some(0) }.resolve(), 1);
        assert_eq!(Limit { limit: Some(500) }.resolve(), 50);
        assert_eq!(Limit { limit: Some(7) }.resolve(), 7);
    }
}
