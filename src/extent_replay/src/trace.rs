use std::{fs, path::Path};

use anyhow::{bail, Context};

/// One `(lba, pba, len)` row of a trace and the line it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple {
    pub lba: u64,
    pub pba: u64,
    pub len: u64,
    pub line: usize,
}

pub fn load_trace<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Triple>> {
    let path = path.as_ref();
    let input = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    parse_trace(&input).with_context(|| format!("invalid trace {}", path.display()))
}

/// Parses one triple per line. Fields are separated by whitespace or commas, braces are
/// ignored so rows like `{ 8, 120, 4 },` are accepted, and `#` starts a comment.
pub fn parse_trace(input: &str) -> anyhow::Result<Vec<Triple>> {
    let mut triples = Vec::new();
    for (i, raw) in input.lines().enumerate() {
        let line = i + 1;
        let row = raw.split('#').next().unwrap_or("");
        let row = row.replace(|c: char| c == '{' || c == '}' || c == ',', " ");
        let fields: Vec<&str> = row.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 3 {
            bail!(
                "line {}: expected 3 fields (lba pba len), got {}",
                line,
                fields.len()
            );
        }
        let mut values = [0u64; 3];
        for (v, f) in values.iter_mut().zip(&fields) {
            *v = f
                .parse()
                .with_context(|| format!("line {}: invalid block address {:?}", line, f))?;
        }
        let [lba, pba, len] = values;
        if pba == 0 {
            bail!("line {}: pba must be positive", line);
        }
        if len == 0 {
            bail!("line {}: len must be positive", line);
        }
        triples.push(Triple {
            lba,
            pba,
            len,
            line,
        });
    }
    Ok(triples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_formats() {
        let input = "\
# lba pba len
0 100 20

5, 500, 5
\t{ 10, 700, 2 },   # table row
";
        let got = parse_trace(input).unwrap();
        assert_eq!(
            got,
            vec![
                Triple {
                    lba: 0,
                    pba: 100,
                    len: 20,
                    line: 2
                },
                Triple {
                    lba: 5,
                    pba: 500,
                    len: 5,
                    line: 4
                },
                Triple {
                    lba: 10,
                    pba: 700,
                    len: 2,
                    line: 5
                },
            ]
        );
    }

    #[test]
    fn parse_rejects_bad_rows() {
        struct Test {
            _name: &'static str,
            input: &'static str,
            err: &'static str,
        }
        let tests = vec![
            Test {
                _name: "Too few fields",
                input: "1 2\n",
                err: "line 1: expected 3 fields",
            },
            Test {
                _name: "Negative lba",
                input: "0 1 1\n-1 100 4\n",
                err: "line 2: invalid block address",
            },
            Test {
                _name: "Zero pba",
                input: "3 0 4\n",
                err: "line 1: pba must be positive",
            },
            Test {
                _name: "Zero len",
                input: "\n3 9 0\n",
                err: "line 2: len must be positive",
            },
        ];
        for test in tests {
            let err = parse_trace(test.input).unwrap_err();
            assert!(
                format!("{:#}", err).contains(test.err),
                "{}: {:#}",
                test._name,
                err
            );
        }
    }

    #[test]
    fn load_missing_file() {
        let err = load_trace("/nonexistent/trace.txt").unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read trace"));
    }
}
