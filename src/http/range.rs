/// A parsed `Range` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Range {
    /// The range unit, usually `bytes`.
    pub unit: String,
    pub ranges: Vec<ByteRange>,
}

/// An inclusive byte range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// The number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Error returned by [`Range::parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("malformed range header")]
    Malformed,
    #[error("range not satisfiable")]
    Unsatisfiable,
}

impl Range {
    /// Parse a `Range` header against a resource of `size` bytes.
    ///
    /// Ranges are clamped to the resource, and ranges starting past the
    /// end are dropped. If no range remains, the header is unsatisfiable.
    pub fn parse(header: &str, size: u64) -> Result<Range, RangeError> {
        let (unit, specs) = header.split_once('=').ok_or(RangeError::Malformed)?;
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(RangeError::Malformed);
        }

        let mut ranges = Vec::new();
        for spec in specs.split(',') {
            let (start, end) = spec.trim().split_once('-').ok_or(RangeError::Malformed)?;
            let (start, end) = (start.trim(), end.trim());

            let range = match (start.is_empty(), end.is_empty()) {
                // suffix range, `-500` is the last 500 bytes
                (true, false) => {
                    let suffix: u64 = end.parse().map_err(|_| RangeError::Malformed)?;
                    if suffix == 0 || size == 0 {
                        continue;
                    }
                    ByteRange {
                        start: size.saturating_sub(suffix),
                        end: size - 1,
                    }
                }
                (false, _) => {
                    let start: u64 = start.parse().map_err(|_| RangeError::Malformed)?;
                    let end = match end.is_empty() {
                        true => size.saturating_sub(1),
                        false => {
                            let end: u64 = end.parse().map_err(|_| RangeError::Malformed)?;
                            end.min(size.saturating_sub(1))
                        }
                    };

                    if start >= size {
                        continue;
                    }

                    if start > end {
                        return Err(RangeError::Malformed);
                    }

                    ByteRange { start, end }
                }
                (true, true) => return Err(RangeError::Malformed),
            };

            ranges.push(range);
        }

        if ranges.is_empty() {
            return Err(RangeError::Unsatisfiable);
        }

        Ok(Range {
            unit: unit.to_owned(),
            ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_ranges() {
        let range = Range::parse("bytes=0-4, 10-, -3", 20).unwrap();
        assert_eq!(range.unit, "bytes");
        assert_eq!(
            range.ranges,
            vec![
                ByteRange { start: 0, end: 4 },
                ByteRange { start: 10, end: 19 },
                ByteRange { start: 17, end: 19 },
            ]
        );

        assert_eq!(Range::parse("bytes=30-40", 20), Err(RangeError::Unsatisfiable));
        assert_eq!(Range::parse("bytes", 20), Err(RangeError::Malformed));
        assert_eq!(Range::parse("bytes=a-b", 20), Err(RangeError::Malformed));
    }
}
