//! Table file inspection.
//!
//! The file length is checked against the selected layout before the table
//! is opened, so inspecting a file with the wrong `--kind` reports an error
//! instead of resizing the file.

use crate::cli::{InspectArgs, TableKind};
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use stockroom_catalog::products::ProductTable;
use stockroom_catalog::users::{USERNAME_BYTES, UserTable};
use stockroom_catalog::{ProductCodec, ProductsRepository, UsersRepository};
use stockroom_storage::codec::{FixedStringCodec, I32Codec};
use stockroom_storage::disk_array::PRELUDE_SIZE;
use stockroom_storage::table::{
    STATE_EMPTY, STATE_FULL, STATE_TOMBSTONE, SlotCodec, TABLE_HEADER_SIZE,
};
use stockroom_storage::{DiskHashTable, FixedCodec, HashFunction};

/// Summary of one table file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    /// File inspected
    pub path: String,
    /// Slot count
    pub capacity: u32,
    /// Bytes per slot
    pub slot_size: usize,
    /// Live entries according to the header
    pub entry_count: u32,
    /// Serial counter according to the header
    pub serial_count: u32,
    /// `entry_count / capacity`
    pub load_factor: f64,
    /// EMPTY slots found by a scan
    pub empty: u32,
    /// FULL slots found by a scan
    pub full: u32,
    /// TOMBSTONE slots found by a scan
    pub tombstones: u32,
    /// Non-empty slots, when requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotDump>,
}

/// Raw contents of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDump {
    /// Slot index
    pub index: u32,
    /// State name
    pub state: &'static str,
    /// Slot bytes, state byte included
    pub hex: String,
}

/// Build a report for the file named by `args`.
pub fn inspect(args: &InspectArgs) -> Result<TableReport> {
    let path = args.file.as_path();
    ensure!(path.is_file(), "{} is not a table file", path.display());

    match args.kind {
        TableKind::Products => {
            let slot_size = SlotCodec::new(I32Codec, ProductCodec::default()).fixed_size();
            check_length(path, slot_size, args.kind)?;
            let table: ProductTable = ProductsRepository::new(path, 1).open()?;
            let report = report(&table, args.slots)?;
            table.close()?;
            Ok(report)
        }
        TableKind::Users => {
            let slot_size =
                SlotCodec::new(FixedStringCodec::new(USERNAME_BYTES), I32Codec).fixed_size();
            check_length(path, slot_size, args.kind)?;
            let table: UserTable = UsersRepository::new(path, 1).open()?;
            let report = report(&table, args.slots)?;
            table.close()?;
            Ok(report)
        }
    }
}

/// Write `report` as text.
pub fn render(report: &TableReport, out: &mut impl Write) -> Result<()> {
    writeln!(out, "File:         {}", report.path)?;
    writeln!(out, "Capacity:     {}", report.capacity)?;
    writeln!(out, "Slot size:    {} bytes", report.slot_size)?;
    writeln!(out, "Entries:      {}", report.entry_count)?;
    writeln!(out, "Serial:       {}", report.serial_count)?;
    writeln!(out, "Load factor:  {:.3}", report.load_factor)?;
    writeln!(
        out,
        "Slots:        {} full, {} tombstone, {} empty",
        report.full, report.tombstones, report.empty
    )?;

    if !report.slots.is_empty() {
        writeln!(out)?;
        for slot in &report.slots {
            writeln!(out, "{:>8} {:<9} {}", slot.index, slot.state, slot.hex)?;
        }
    }
    Ok(())
}

fn report<KC, VC, F>(table: &DiskHashTable<KC, VC, F>, with_slots: bool) -> Result<TableReport>
where
    KC: FixedCodec,
    KC::Value: PartialEq,
    VC: FixedCodec,
    F: HashFunction<KC::Value>,
{
    let header = table.header()?;
    let stats = table.stats()?;
    let capacity = table.capacity();

    let mut slots = Vec::new();
    if with_slots {
        for index in 0..capacity {
            let raw = table.raw_slot(index)?;
            let state = match raw.first().copied() {
                Some(STATE_EMPTY) => continue,
                Some(STATE_FULL) => "full",
                Some(STATE_TOMBSTONE) => "tombstone",
                _ => "corrupt",
            };
            slots.push(SlotDump {
                index,
                state,
                hex: hex::encode(raw),
            });
        }
    }

    Ok(TableReport {
        path: table.path().display().to_string(),
        capacity,
        slot_size: table.raw_slot(0)?.len(),
        entry_count: header.entry_count,
        serial_count: header.serial_count,
        load_factor: f64::from(header.entry_count) / f64::from(capacity),
        empty: stats.empty,
        full: stats.full,
        tombstones: stats.tombstones,
        slots,
    })
}

fn check_length(path: &Path, slot_size: usize, kind: TableKind) -> Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file.metadata()?.len();

    let mut prelude = [0u8; PRELUDE_SIZE];
    file.read_exact(&mut prelude)
        .with_context(|| format!("{} is too short to hold a table", path.display()))?;
    let capacity = u32::from_le_bytes(prelude);

    let expected =
        (PRELUDE_SIZE + TABLE_HEADER_SIZE) as u64 + u64::from(capacity) * slot_size as u64;
    ensure!(
        capacity > 0 && len == expected,
        "{} is {} bytes, but a {:?} table of capacity {} needs {} bytes",
        path.display(),
        len,
        kind,
        capacity,
        expected
    );
    Ok(())
}
