//! Chain-length statistics for a [`Dict`], with a plain-text report.

use crate::dict::{Dict, Table};
use crate::dict_type::DictType;
use core::fmt;

/// Chain lengths tracked individually; longer chains share the last slot.
pub const CHAIN_HISTOGRAM_SLOTS: usize = 50;

/// Statistics of one bucket array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    pub table_size: usize,
    pub elements: usize,
    /// Non-empty buckets.
    pub slots: usize,
    pub max_chain_len: usize,
    pub total_chain_len: usize,
    /// `histogram[n]` counts buckets with a chain of length `n`.
    pub histogram: [usize; CHAIN_HISTOGRAM_SLOTS],
}

impl TableStats {
    /// Average chain length over non-empty buckets, from walking the chains.
    pub fn avg_chain_len_counted(&self) -> f64 {
        if self.slots == 0 {
            0.0
        } else {
            self.total_chain_len as f64 / self.slots as f64
        }
    }

    /// Average chain length over non-empty buckets, from the element count.
    pub fn avg_chain_len_computed(&self) -> f64 {
        if self.slots == 0 {
            0.0
        } else {
            self.elements as f64 / self.slots as f64
        }
    }
}

/// Statistics of a whole dictionary; `rehash_target` is set while rehashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictStats {
    pub main: TableStats,
    pub rehash_target: Option<TableStats>,
}

impl<K, V, T> Dict<K, V, T>
where
    K: Eq,
    T: DictType<K, V>,
{
    pub fn stats(&self) -> DictStats {
        DictStats {
            main: self.table_stats(&self.ht[0]),
            rehash_target: self
                .is_rehashing()
                .then(|| self.table_stats(&self.ht[1])),
        }
    }

    fn table_stats(&self, table: &Table) -> TableStats {
        let mut s = TableStats {
            table_size: table.size(),
            elements: table.used,
            slots: 0,
            max_chain_len: 0,
            total_chain_len: 0,
            histogram: [0; CHAIN_HISTOGRAM_SLOTS],
        };
        for head in &table.buckets {
            let mut len: usize = 0;
            let mut cur = *head;
            while let Some(id) = cur {
                len += 1;
                cur = self.entries.get(id).and_then(|e| e.next);
            }
            s.histogram[len.min(CHAIN_HISTOGRAM_SLOTS - 1)] += 1;
            if len == 0 {
                continue;
            }
            s.slots += 1;
            s.max_chain_len = s.max_chain_len.max(len);
            s.total_chain_len += len;
        }
        s
    }
}

fn write_table(f: &mut fmt::Formatter<'_>, id: usize, s: &TableStats) -> fmt::Result {
    if s.elements == 0 {
        return writeln!(f, "No stats available for empty dictionaries");
    }
    let name = if id == 0 {
        "main hash table"
    } else {
        "rehashing target"
    };
    writeln!(f, "Hash table {} stats ({}):", id, name)?;
    writeln!(f, " table size: {}", s.table_size)?;
    writeln!(f, " number of elements: {}", s.elements)?;
    writeln!(f, " different slots: {}", s.slots)?;
    writeln!(f, " max chain length: {}", s.max_chain_len)?;
    writeln!(
        f,
        " avg chain length (counted): {:.2}",
        s.avg_chain_len_counted()
    )?;
    writeln!(
        f,
        " avg chain length (computed): {:.2}",
        s.avg_chain_len_computed()
    )?;
    writeln!(f, " Chain length distribution:")?;
    for (len, &count) in s.histogram.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let prefix = if len == CHAIN_HISTOGRAM_SLOTS - 1 {
            ">= "
        } else {
            ""
        };
        writeln!(
            f,
            "   {}{}: {} ({:.2}%)",
            prefix,
            len,
            count,
            count as f64 / s.table_size as f64 * 100.0
        )?;
    }
    Ok(())
}

impl fmt::Display for DictStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_table(f, 0, &self.main)?;
        if let Some(target) = &self.rehash_target {
            write_table(f, 1, target)?;
        }
        Ok(())
    }
}
