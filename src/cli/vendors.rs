use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;

pub fn list() -> Result<()> {
    let store = open_store()?;
    let rules = store.vendor_rules()?;
    if rules.is_empty() {
        println!("No vendor rules yet. They are learned when you pick a custom category.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Merchant", "Category"]);
    for rule in rules {
        table.add_row(vec![Cell::new(rule.merchant), Cell::new(rule.category)]);
    }
    println!("Vendor rules\n{table}");
    Ok(())
}
