//! Parallel file processing utilities.

use anyhow::{Result, bail};
use log::error;
use rayon::prelude::*;

/// Result of a parallel batch operation.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn ok_or_bail(&self, operation: &str) -> Result<()> {
        if self.failed > 0 {
            bail!("{operation} failed: {} succeeded, {} failed", self.succeeded, self.failed);
        }
        Ok(())
    }
}

/// Process items in parallel with consistent error reporting.
pub fn process_parallel_iter<T, R, F>(
    label: &str,
    items: impl IntoIterator<Item = T>,
    op: F,
) -> BatchResult
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R> + Sync,
{
    let items: Vec<T> = items.into_iter().collect();
    let results: Vec<_> = items.into_par_iter().map(&op).collect();

    let mut result = BatchResult::default();
    for r in &results {
        if let Err(e) = r {
            error!("{e:#}");
            result.failed += 1;
        } else {
            result.succeeded += 1;
        }
    }

    println!("{label}: {} succeeded, {} failed", result.succeeded, result.failed);
    result
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_batch_counts() {
        let result = process_parallel_iter("Test", 0..10, |i| {
            if i % 3 == 0 { Err(anyhow!("item {i}")) } else { Ok(i) }
        });
        assert_eq!(result.succeeded, 6);
        assert_eq!(result.failed, 4);
        assert!(result.ok_or_bail("Test").is_err());
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let result = process_parallel_iter("Test", Vec::<u8>::new(), |_| Ok(()));
        assert_eq!(result.failed, 0);
        assert!(result.ok_or_bail("Test").is_ok());
    }
}
