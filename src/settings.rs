use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::database::{Database, DatabaseError};

/// A typed settings record stored as JSON under a fixed key
pub trait Setting: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
}

impl Database {
    /// Load a typed setting, falling back to its default
    pub fn load_setting<T: Setting>(&self) -> Result<T, DatabaseError> {
        self.get_setting(T::KEY, T::default())
    }

    pub fn store_setting<T: Setting>(&self, value: &T) -> Result<(), DatabaseError> {
        self.set_setting(T::KEY, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Autosave {
        interval_secs: u64,
    }

    impl Setting for Autosave {
        const KEY: &'static str = "autosave";
    }

    #[test]
    fn test_typed_setting_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_setting::<Autosave>().unwrap(), Autosave::default());

        db.store_setting(&Autosave { interval_secs: 5 }).unwrap();
        assert_eq!(db.load_setting::<Autosave>().unwrap().interval_secs, 5);
    }

    #[test]
    fn test_wrong_shape_reads_as_default() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("autosave", "fast").unwrap();
        assert_eq!(db.load_setting::<Autosave>().unwrap(), Autosave::default());
    }
}
