use crate::{align::WORD_SIZE, error::HeapError};

/// Default growth granularity: one page on most systems.
pub const BATCH_UNIT: usize = 4096;

/// Tunables for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Every batch requested from the heap source is a multiple of this.
  pub batch_unit: usize,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      batch_unit: BATCH_UNIT,
    }
  }
}

impl HeapConfig {
  pub fn with_batch_unit(batch_unit: usize) -> Result<Self, HeapError> {
    let config = Self { batch_unit };
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), HeapError> {
    if self.batch_unit == 0 || self.batch_unit % WORD_SIZE != 0 {
      return Err(HeapError::InvalidBatchUnit(self.batch_unit));
    }

    Ok(())
  }
}
