use crate::config::{ID_COLUMN, NAME_COLUMN, POPULATION_COLUMN, YEAR_COLUMN};
use crate::types::HarmonizedTable;
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the harmonized table as a flat CSV; missing cells become empty fields.
pub fn write_table<W: Write>(writer: W, table: &HarmonizedTable) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec![ID_COLUMN, NAME_COLUMN, POPULATION_COLUMN, YEAR_COLUMN];
    header.extend(table.metrics.iter().map(String::as_str));
    wtr.write_record(&header)?;
    for r in &table.records {
        let mut fields = vec![
            r.municipality_id.clone(),
            r.municipality_name.clone(),
            r.population.to_string(),
            r.year.to_string(),
        ];
        fields.extend(r.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_table_file(path: &Path, table: &HarmonizedTable) -> Result<(), Box<dyn Error>> {
    let file = std::fs::File::create(path)?;
    write_table(std::io::BufWriter::new(file), table)
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
