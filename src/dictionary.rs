use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use bstr::ByteSlice;
use cqdb::{CQDBWriter, CQDB};

use crate::errors::{Error, Result};
use crate::shared_store::SharedStore;
use crate::task_context::TaskContext;

/// A bidirectional vocabulary mapping terms to dense integer ids
///
/// Each term carries the frequency it was seen with. Ids are assigned in
/// insertion order, so a table loaded from a file sorted by descending
/// frequency gives the most frequent term id 0.
#[derive(Debug, Clone, Default)]
pub struct TermFrequencyMap {
    /// Map from term to id
    term_index: HashMap<String, i32>,
    /// Terms and their frequencies, indexed by id
    terms: Vec<(String, i64)>,
}

impl TermFrequencyMap {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            term_index: HashMap::new(),
            terms: Vec::new(),
        }
    }

    /// Load a table from a term frequency text file
    ///
    /// The first line holds the number of terms, every following line a
    /// `<term> <frequency>` pair. Terms less frequent than `min_frequency` are
    /// skipped and at most `max_num_terms` are kept; zero disables either limit.
    pub fn load<P: AsRef<Path>>(
        path: P,
        min_frequency: i64,
        max_num_terms: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)?;
        let map = Self::from_text(&contents, min_frequency, max_num_terms)?;
        log::info!("loaded {} terms from {}", map.size(), path.display());
        Ok(map)
    }

    /// Parse a table from the contents of a term frequency text file
    pub fn from_text(contents: &[u8], min_frequency: i64, max_num_terms: usize) -> Result<Self> {
        let mut lines = contents.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::invalid_format("empty term frequency file"))?;
        let total: usize = header
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| {
                Error::invalid_format(format!("invalid term count {:?}", header.as_bstr()))
            })?;

        let mut map = Self::new();
        let mut num_read = 0;
        for (i, line) in lines.take(total).enumerate() {
            let lineno = i + 2;
            num_read += 1;
            let line = line
                .to_str()
                .map_err(|e| Error::invalid_format(format!("line {}: {}", lineno, e)))?
                .trim_end();
            let (term, count) = line.rsplit_once(' ').ok_or_else(|| {
                Error::invalid_format(format!("line {}: missing frequency", lineno))
            })?;
            let count: i64 = count.parse().map_err(|_| {
                Error::invalid_format(format!("line {}: invalid frequency {:?}", lineno, count))
            })?;
            if count <= 0 {
                return Err(Error::invalid_format(format!(
                    "line {}: frequency must be positive",
                    lineno
                )));
            }
            if min_frequency > 0 && count < min_frequency {
                continue;
            }
            if max_num_terms > 0 && map.size() >= max_num_terms {
                return Ok(map);
            }
            if map.term_index.contains_key(term) {
                return Err(Error::invalid_format(format!(
                    "line {}: duplicate term {:?}",
                    lineno, term
                )));
            }
            map.insert(term, count);
        }
        if num_read < total {
            return Err(Error::invalid_format(format!(
                "expected {} terms, found {}",
                total, num_read
            )));
        }
        Ok(map)
    }

    /// Load a table from a CQDB file
    ///
    /// CQDB stores only the term/id association, so every frequency is 0.
    pub fn load_cqdb<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buf = fs::read(path)?;
        let map = Self::from_cqdb(&buf)?;
        log::info!("loaded {} terms from {}", map.size(), path.display());
        Ok(map)
    }

    /// Read a table from an in-memory CQDB database
    pub fn from_cqdb(buf: &[u8]) -> Result<Self> {
        let db = CQDB::new(buf)?;
        let mut map = Self::new();
        for id in 0u32.. {
            let term = match db.to_str(id) {
                Some(term) => term
                    .to_str()
                    .map_err(|e| Error::invalid_format(format!("term #{}: {}", id, e)))?,
                None => break,
            };
            if db.to_id(term) != Some(id) || map.term_index.contains_key(term) {
                return Err(Error::invalid_format(format!(
                    "term {:?} does not map back to id {}",
                    term, id
                )));
            }
            map.insert(term, 0);
        }
        Ok(map)
    }

    /// Acquire the table backing a task input through the shared store
    ///
    /// Every caller asking for the same input file and load options gets the
    /// same table. The input's record format selects the loader: `text` (the
    /// default) or `cqdb`. A missing or unreadable input is a configuration
    /// error.
    pub fn acquire(
        context: &TaskContext,
        input: &str,
        min_frequency: i64,
        max_num_terms: usize,
    ) -> Result<Arc<Self>> {
        let path = context.input_file(input).map_err(|e| {
            log::error!("cannot resolve input '{}': {}", input, e);
            e
        })?;
        let format = context.input(input).map_or("", |i| i.record_format.as_str());
        let key = format!(
            "{}:{}:{}:{}",
            format,
            path.display(),
            min_frequency,
            max_num_terms
        );
        SharedStore::get_or_load(&key, || {
            let loaded = match format {
                "" | "text" => Self::load(&path, min_frequency, max_num_terms),
                "cqdb" => Self::load_cqdb(&path),
                other => Err(Error::config(format!("unsupported record format '{}'", other))),
            };
            loaded.map_err(|e| {
                log::error!("cannot load input '{}' from {}: {}", input, path.display(), e);
                Error::config(format!(
                    "cannot load input '{}' from {}: {}",
                    input,
                    path.display(),
                    e
                ))
            })
        })
    }

    fn insert(&mut self, term: &str, count: i64) -> i32 {
        let id = self.terms.len() as i32;
        self.term_index.insert(term.to_string(), id);
        self.terms.push((term.to_string(), count));
        id
    }

    /// Number of terms in the table
    pub fn size(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` if the table contains no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Look up the id of a term, or `default` if it is not in the table
    pub fn lookup_index(&self, term: &str, default: i32) -> i32 {
        self.term_index.get(term).copied().unwrap_or(default)
    }

    /// Get the term with the given id
    pub fn term(&self, id: i32) -> Option<&str> {
        if id < 0 {
            return None;
        }
        self.terms.get(id as usize).map(|(term, _)| term.as_str())
    }

    /// Get the frequency of the term with the given id
    pub fn frequency(&self, id: i32) -> Option<i64> {
        if id < 0 {
            return None;
        }
        self.terms.get(id as usize).map(|&(_, count)| count)
    }

    /// Count one occurrence of a term, adding it if necessary, and return its id
    pub fn increment(&mut self, term: &str) -> i32 {
        match self.term_index.get(term) {
            Some(&id) => {
                self.terms[id as usize].1 += 1;
                id
            }
            None => self.insert(term, 1),
        }
    }

    /// Iterate over all `(term, id, frequency)` triples in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32, i64)> + '_ {
        self.terms
            .iter()
            .enumerate()
            .map(|(id, (term, count))| (term.as_str(), id as i32, *count))
    }

    /// Write the table in term frequency text format
    ///
    /// Terms are written by descending frequency, ties broken by term, so that
    /// reloading the file assigns the most frequent term id 0.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut sorted: Vec<&(String, i64)> = self.terms.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "{}", sorted.len())?;
        for (term, count) in sorted {
            writeln!(w, "{} {}", term, count)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Write the term/id association as a CQDB database
    pub fn save_cqdb<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let mut writer = CQDBWriter::new(&mut file)?;
        for (term, id, _) in self.iter() {
            writer.put(term, id as u32)?;
        }
        // The database is flushed when the writer is dropped.
        drop(writer);
        Ok(())
    }
}
