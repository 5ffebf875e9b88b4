use crate::Error;

/// Iteration count and problem sizes for one benchmark run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchConfig {
    pub iterations: usize,
    pub sum_sizes: Vec<usize>,
    pub max_prefix_sum_sizes: Vec<usize>,
    pub merge_sizes: Vec<usize>,
    pub radix_sizes: Vec<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            sum_sizes: vec![1 << 25],
            max_prefix_sum_sizes: (1..=24).map(|p| 1usize << p).collect(),
            merge_sizes: vec![1 << 25],
            radix_sizes: vec![1 << 25],
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.iterations == 0 {
            return Err(Error::Setup("iteration count must be at least 1".into()));
        }
        let lists = [
            ("sum", &self.sum_sizes),
            ("max_prefix_sum", &self.max_prefix_sum_sizes),
            ("merge", &self.merge_sizes),
            ("radix", &self.radix_sizes),
        ];
        for (name, sizes) in lists {
            if let Some(&n) = sizes.iter().find(|&&n| n == 0 || n > u32::MAX as usize) {
                return Err(Error::Setup(format!(
                    "{} problem size {} is out of range",
                    name, n
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.iterations, 10);
        assert_eq!(cfg.max_prefix_sum_sizes.first(), Some(&2));
        assert_eq!(cfg.max_prefix_sum_sizes.last(), Some(&(1 << 24)));
        assert_eq!(cfg.max_prefix_sum_sizes.len(), 24);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_iterations_and_empty_problems() {
        let cfg = BenchConfig {
            iterations: 0,
            ..BenchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Setup(_))));

        let cfg = BenchConfig {
            radix_sizes: vec![16, 0],
            ..BenchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Setup(m)) if m.contains("radix")));
    }
}
