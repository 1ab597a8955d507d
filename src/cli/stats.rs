use crate::cli::open_store;
use crate::error::Result;
use crate::fmt::percent;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let store = open_store()?;
    let counts = store.status_counts()?;

    let classified = (counts.classified_by_ai + counts.user_modified) as usize;
    let total = classified + (counts.pending + counts.unclassified) as usize;

    println!("Database:         {}", settings.db_path().display());
    println!();
    println!("Transactions:     {total}");
    println!(
        "Classified:       {classified} ({})",
        percent(classified, total)
    );
    println!("  by suggestion:  {}", counts.classified_by_ai);
    println!("  by you:         {}", counts.user_modified);
    println!("Skipped:          {}", counts.unclassified);
    println!("Never reviewed:   {}", counts.pending);
    Ok(())
}
