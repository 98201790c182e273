//! CEP Data Frame (component 8): a per-table buffer of CSV rows, split
//! into a pending batch and an archived batch, with one node per table.
//!
//! The source models this as a doubly-linked list with a self-loop head
//! sentinel. This crate uses an arena instead (`Vec<Option<DataFrameSlot>>`
//! indexed by `usize`, `previous`/`next` as `Option<usize>`), which keeps
//! the same operations without pointer-chasing.

use tracing::{debug, error};

use crate::error::Error;

/// One table's buffered rows, plus its position in the list.
struct DataFrameSlot {
    table_name: String,
    column_header: Option<String>,
    pending_rows: Vec<String>,
    archived_rows: Vec<String>,
    previous: Option<usize>,
    next: Option<usize>,
}

/// The list of per-table data frame slots. `head`/`tail` track the ends of
/// the chain; `free` recycles indices freed by [`DataFrameList::remove`] so
/// the arena does not grow unbounded under churn.
#[derive(Default)]
pub struct DataFrameList {
    slots: Vec<Option<DataFrameSlot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl DataFrameList {
    pub fn new() -> DataFrameList {
        DataFrameList {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Linear walk from the head of the list; exact string equality on
    /// `table_name`.
    pub fn find(&self, table_name: &str) -> Option<usize> {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let slot = self.slots[idx].as_ref().expect("linked index must be live");
            if slot.table_name == table_name {
                return Some(idx);
            }
            cursor = slot.next;
        }
        None
    }

    fn append_slot(&mut self, table_name: &str) -> usize {
        let slot = DataFrameSlot {
            table_name: table_name.to_string(),
            column_header: None,
            pending_rows: Vec::new(),
            archived_rows: Vec::new(),
            previous: self.tail,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        if let Some(tail) = self.tail {
            self.slots[tail].as_mut().unwrap().next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
        idx
    }

    /// Parse CRLF-delimited CSV text into a header line and the remaining
    /// data rows, each with its trailing CRLF stripped. LF-only input is
    /// rejected rather than normalised. Returns `Err(Error::Csv(..))` on
    /// anything the source would have surfaced as `-1`: no CRLF-framed
    /// rows, a header with no data rows following it, or empty input.
    fn parse_csv(csv_text: &str) -> Result<(String, Vec<String>), Error> {
        if csv_text.is_empty() {
            return Err(Error::Csv("csv_text must not be empty".into()));
        }
        if csv_text.contains('\n') && !csv_text.contains("\r\n") {
            return Err(Error::Csv("row separator must be CRLF, found bare LF".into()));
        }
        let mut lines: Vec<&str> = csv_text.split("\r\n").collect();
        while matches!(lines.last(), Some(&"")) {
            lines.pop();
        }
        if lines.is_empty() {
            return Err(Error::Csv("no header row found".into()));
        }
        let header = lines[0].to_string();
        let rows: Vec<String> = lines[1..].iter().map(|s| s.to_string()).collect();
        if rows.is_empty() {
            return Err(Error::Csv("no data rows after header".into()));
        }
        Ok((header, rows))
    }

    /// Ingest CRLF-framed CSV text for `table_name`, creating its node if
    /// this is the first ingest against that table. Returns the number of
    /// data rows appended to `pending_rows`, or `-1` on any malformed or
    /// empty input.
    pub fn ingest_csv(&mut self, table_name: &str, csv_text: &str) -> i64 {
        if table_name.is_empty() {
            error!(target: "graphstore::cep::frame", "ingest_csv: table_name must not be empty");
            return -1;
        }
        let (header, rows) = match Self::parse_csv(csv_text) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(target: "graphstore::cep::frame", table_name, error = %e, "ingest_csv: malformed or empty csv_text");
                return -1;
            }
        };

        let idx = self.find(table_name).unwrap_or_else(|| self.append_slot(table_name));
        let slot = self.slots[idx].as_mut().expect("resolved index must be live");
        if slot.column_header.is_none() {
            slot.column_header = Some(header);
        }
        let ingested = rows.len() as i64;
        slot.pending_rows.extend(rows);
        debug!(target: "graphstore::cep::frame", table_name, ingested, "ingested csv rows");
        ingested
    }

    /// Append every `pending_rows` element to the tail of `archived_rows`
    /// in order, then empty `pending_rows`. Returns `false` if no node
    /// exists for `table_name`.
    pub fn move_pending_to_archived(&mut self, table_name: &str) -> bool {
        let Some(idx) = self.find(table_name) else {
            return false;
        };
        let slot = self.slots[idx].as_mut().expect("resolved index must be live");
        slot.archived_rows.append(&mut slot.pending_rows);
        true
    }

    /// Unlink and free the node for `table_name`. Siblings are untouched.
    /// Returns `false` if no node exists for `table_name`.
    pub fn remove(&mut self, table_name: &str) -> bool {
        let Some(idx) = self.find(table_name) else {
            return false;
        };
        let (previous, next) = {
            let slot = self.slots[idx].as_ref().unwrap();
            (slot.previous, slot.next)
        };
        match previous {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().previous = previous,
            None => self.tail = previous,
        }
        self.slots[idx] = None;
        self.free.push(idx);
        true
    }

    /// Number of nodes in the list, counted by walking from the head.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            count += 1;
            cursor = self.slots[idx].as_ref().unwrap().next;
        }
        count
    }

    /// Walk from head, freeing every node's owned state. Idempotent: safe
    /// to call on an already-empty list.
    pub fn destroy(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn column_header(&self, table_name: &str) -> Option<&str> {
        let idx = self.find(table_name)?;
        self.slots[idx].as_ref().unwrap().column_header.as_deref()
    }

    pub fn pending_rows(&self, table_name: &str) -> Option<&[String]> {
        let idx = self.find(table_name)?;
        Some(&self.slots[idx].as_ref().unwrap().pending_rows)
    }

    pub fn archived_rows(&self, table_name: &str) -> Option<&[String]> {
        let idx = self.find(table_name)?;
        Some(&self.slots[idx].as_ref().unwrap().archived_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_ingest() {
        let mut frame = DataFrameList::new();
        let n = frame.ingest_csv("t", "a,b\r\n1,2\r\n3,4\r\n");
        assert_eq!(n, 2);
        assert_eq!(frame.pending_rows("t").unwrap().len(), 2);
        assert_eq!(frame.archived_rows("t").unwrap().len(), 0);
        assert_eq!(frame.column_header("t"), Some("a,b"));
    }

    #[test]
    fn header_capture_then_ignored_on_subsequent_ingest() {
        let mut frame = DataFrameList::new();
        frame.ingest_csv("sensor", "ts,val\r\n100,1.5\r\n101,1.6\r\n");
        assert_eq!(frame.column_header("sensor"), Some("ts,val"));

        frame.move_pending_to_archived("sensor");
        let n = frame.ingest_csv("sensor", "ts,val\r\n102,1.7\r\n");

        assert_eq!(n, 1);
        assert_eq!(frame.column_header("sensor"), Some("ts,val"));
        assert_eq!(frame.archived_rows("sensor").unwrap(), &["100,1.5", "101,1.6"]);
        assert_eq!(frame.pending_rows("sensor").unwrap(), &["102,1.7"]);
    }

    #[test]
    fn lf_only_input_is_rejected() {
        let mut frame = DataFrameList::new();
        assert_eq!(frame.ingest_csv("t", "a,b\n1,2\n"), -1);
    }

    #[test]
    fn header_only_input_is_rejected() {
        let mut frame = DataFrameList::new();
        assert_eq!(frame.ingest_csv("t", "a,b\r\n"), -1);
    }

    #[test]
    fn empty_table_name_is_rejected() {
        let mut frame = DataFrameList::new();
        assert_eq!(frame.ingest_csv("", "a,b\r\n1,2\r\n"), -1);
    }

    #[test]
    fn remove_unlinks_only_target_and_keeps_siblings() {
        let mut frame = DataFrameList::new();
        frame.ingest_csv("a", "x\r\n1\r\n");
        frame.ingest_csv("b", "x\r\n2\r\n");
        frame.ingest_csv("c", "x\r\n3\r\n");
        assert_eq!(frame.size(), 3);

        assert!(frame.remove("b"));
        assert_eq!(frame.size(), 2);
        assert!(frame.find("b").is_none());
        assert!(frame.find("a").is_some());
        assert!(frame.find("c").is_some());
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut frame = DataFrameList::new();
        frame.ingest_csv("a", "x\r\n1\r\n");
        frame.destroy();
        assert_eq!(frame.size(), 0);
        frame.destroy();
        assert_eq!(frame.size(), 0);
    }
}
