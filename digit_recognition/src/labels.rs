use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

const MNIST_NAMES: [&str; 10] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigitLabel {
    pub digit: usize,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DigitLabels {
    labels: Vec<DigitLabel>,
}

impl DigitLabels {
    pub fn mnist() -> Self {
        let labels = MNIST_NAMES
            .iter()
            .enumerate()
            .map(|(digit, name)| DigitLabel {
                digit,
                name: name.to_string(),
            })
            .collect();
        Self { labels }
    }

    pub fn from_file(filepath: &Path) -> io::Result<Self> {
        let file = File::open(filepath)?;
        Self::from_reader(io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut labels = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (digit, name) = line.split_once(',').ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid line format: {}", line),
                )
            })?;
            let digit: usize = digit
                .trim()
                .parse()
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid digit value"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Missing name for digit {}", digit),
                ));
            }

            labels.push(DigitLabel {
                digit,
                name: name.to_string(),
            });
        }

        labels.sort_by_key(|label| label.digit);
        Ok(Self { labels })
    }

    pub fn name(&self, digit: usize) -> String {
        self.labels
            .iter()
            .find(|label| label.digit == digit)
            .map(|label| label.name.clone())
            .unwrap_or_else(|| format!("Unknown digit {}", digit))
    }

    pub fn all(&self) -> &[DigitLabel] {
        &self.labels
    }
}
