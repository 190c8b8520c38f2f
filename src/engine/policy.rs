use super::EngineError;
use crate::shared::atomic_write_file;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug)]
pub struct ToolPolicy {
    path: PathBuf,
    catalog: Vec<String>,
    allowed: Mutex<Vec<String>>,
}

impl ToolPolicy {
    pub fn load_or_seed(
        path: PathBuf,
        catalog: Vec<String>,
        initial: Vec<String>,
    ) -> Result<Self, EngineError> {
        let allowed = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| EngineError::ReadState {
                path: path.display().to_string(),
                source,
            })?;
            let names: Vec<String> =
                serde_json::from_str(&raw).map_err(|source| EngineError::ParseState {
                    path: path.display().to_string(),
                    source,
                })?;
            for name in &names {
                if !catalog.contains(name) {
                    return Err(EngineError::UnknownTool { name: name.clone() });
                }
            }
            names
        } else {
            persist(&path, &initial)?;
            initial
        };

        Ok(Self {
            path,
            catalog,
            allowed: Mutex::new(allowed),
        })
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.allowed.lock().expect("policy lock").clone()
    }

    pub fn replace(&self, names: Vec<String>) -> Result<(), EngineError> {
        for name in &names {
            if !self.catalog.contains(name) {
                return Err(EngineError::UnknownTool { name: name.clone() });
            }
        }
        let mut guard = self.allowed.lock().expect("policy lock");
        persist(&self.path, &names)?;
        *guard = names;
        Ok(())
    }
}

fn persist(path: &PathBuf, names: &[String]) -> Result<(), EngineError> {
    let encoded = serde_json::to_vec_pretty(names).map_err(|source| EngineError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    atomic_write_file(path, &encoded).map_err(|source| EngineError::WriteState {
        path: path.display().to_string(),
        source,
    })
}
