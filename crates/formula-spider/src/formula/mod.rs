/// Reduction of the combined statements to one record of fundamentals per ticker.
pub mod fundamentals;

/// Greenblatt-style ranking on earnings yield and return on capital.
pub mod rank;
