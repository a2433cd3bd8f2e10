/// Analysis settings recognized by the ZBDD engine.
///
/// `limit_order` hard-caps the cardinality of generated cut sets:
/// branches that can only lead to larger products are truncated during
/// construction, silently. `probability_analysis` is informational and
/// does not alter cut-set computation; it signals the surrounding
/// toolchain to populate basic-event expressions.
#[derive(Debug, Copy, Clone)]
pub struct Settings {
    limit_order: u32,
    probability_analysis: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_order: 20,
            probability_analysis: false,
        }
    }
}

impl Settings {
    pub fn limit_order(&self) -> u32 {
        self.limit_order
    }

    pub fn probability_analysis(&self) -> bool {
        self.probability_analysis
    }

    pub fn with_limit_order(mut self, limit_order: u32) -> Self {
        assert!(limit_order > 0, "The limit order must be positive");
        self.limit_order = limit_order;
        self
    }

    pub fn with_probability_analysis(mut self, flag: bool) -> Self {
        self.probability_analysis = flag;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.limit_order(), 20);
        assert!(!settings.probability_analysis());
    }

    #[test]
    #[should_panic(expected = "The limit order must be positive")]
    fn test_zero_limit_order() {
        let _ = Settings::default().with_limit_order(0);
    }
}
