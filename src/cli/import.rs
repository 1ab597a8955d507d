use std::path::PathBuf;

use crate::cli::open_store;
use crate::error::Result;
use crate::importer::import_file;

pub fn run(file: &str, account: &str) -> Result<()> {
    let store = open_store()?;
    let result = import_file(&store, &PathBuf::from(file), account)?;

    println!(
        "{} imported, {} skipped (duplicates)",
        result.imported, result.duplicates
    );
    if result.invalid > 0 {
        println!("{} rows could not be read", result.invalid);
    }
    if result.imported > 0 {
        println!("Run `tally classify` to classify them.");
    }
    Ok(())
}
