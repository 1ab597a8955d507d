use std::path::PathBuf;

use crate::db::Store;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    save_settings(&settings)?;

    let db_path = settings.db_path();
    let existed = db_path.exists();
    Store::open(&db_path)?;

    if existed {
        println!("Using existing database at {}", db_path.display());
    } else {
        println!("Created database at {}", db_path.display());
    }
    Ok(())
}
