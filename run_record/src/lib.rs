//! Run records for the solver binaries.
//!
//! Captures what a run was (parameters, world shape, host) and what it did
//! (timings, counters) as one JSON line appended to a records file, so a
//! batch of runs can be collected and compared afterwards.

use std::collections::HashMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use json::JsonValue;

pub struct RunRecord {
    pub name: String,
    rank: usize,
    world_size: usize,
    parameters: Vec<String>,
    run_date: String,
    output: HashMap<String, String>,
    system: HashMap<String, String>,
    environment_vars: HashMap<String, String>,
}

impl RunRecord {
    pub fn new(name: &str, rank: usize, world_size: usize) -> Self {
        Self {
            name: name.to_string(),
            rank,
            world_size,
            parameters: env::args().skip(1).collect(),
            run_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            output: HashMap::new(),
            system: Self::get_system_info(),
            environment_vars: Self::collect_env_vars("LAMELLAR"),
        }
    }

    /// Add a key/value pair to the output section.
    pub fn with_output(&mut self, key: &str, value: String) {
        self.output.insert(key.to_string(), value);
    }

    /// Convert the captured information into a JsonValue object.
    pub fn as_json(&self) -> JsonValue {
        json::object! {
            "name" => self.name.clone(),
            "rank" => self.rank,
            "world_size" => self.world_size,
            "parameters" => self.parameters.clone(),
            "run_date" => self.run_date.clone(),
            "output" => self.output.clone(),
            "system" => self.system.clone(),
            "environment" => self.environment_vars.clone(),
        }
    }

    /// Display the captured information in JSON format to stdout.
    /// If `indent` is `Some(n)`, pretty-prints with that indentation.
    pub fn display(&self, indent: Option<u16>) {
        let json_obj = self.as_json();
        match indent {
            None => println!("{}", json::stringify(json_obj)),
            Some(indent) => println!("{}", json::stringify_pretty(json_obj, indent)),
        }
    }

    /// Append the record to `file` in JSON-lines form, creating it and any
    /// missing parent directories first.
    pub fn write(&self, file: &Path) {
        if let Some(parent) = file.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(file) {
            let _ = writeln!(f, "{}", json::stringify(self.as_json()));
        }
    }

    /// Collects all environment variables that start with the given prefix.
    fn collect_env_vars(prefix: &str) -> HashMap<String, String> {
        env::vars()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect()
    }

    /// Gathers selected system information using the sysinfo crate.
    fn get_system_info() -> HashMap<String, String> {
        let mut system_info = HashMap::new();
        let sys = sysinfo::System::new_all();

        if let Some(hostname) = sysinfo::System::host_name() {
            system_info.insert("hostname".to_string(), hostname);
        }
        if let Some(os_name) = sysinfo::System::name() {
            system_info.insert("os_name".to_string(), os_name);
        }
        system_info.insert("cpu_cores".to_string(), sys.cpus().len().to_string());
        system_info.insert("ram_bytes".to_string(), sys.total_memory().to_string());

        system_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_updates() {
        let mut record = RunRecord::new("solver", 0, 4);
        assert_eq!(record.output.len(), 0);

        record.with_output("test_key", "test_value".into());
        assert_eq!(record.output.len(), 1);
        assert_eq!(record.output["test_key"], "test_value");
    }

    #[test]
    fn test_world_shape_in_json() {
        let record = RunRecord::new("solver", 2, 8);
        let json_obj = record.as_json();
        assert_eq!(json_obj["name"], "solver");
        assert_eq!(json_obj["rank"], 2);
        assert_eq!(json_obj["world_size"], 8);
    }

    #[test]
    fn test_env_capture() {
        // must run in this order since the second changes what the first reads
        test_empty_env();
        test_non_empty_env();
    }

    fn test_empty_env() {
        let record = RunRecord::new("solver", 0, 1);
        assert_eq!(0, record.environment_vars.len());
    }

    fn test_non_empty_env() {
        env::set_var("LAMELLAR_A", "A");
        env::set_var("LAMELLAR_B", "B");

        let record = RunRecord::new("solver", 0, 1);
        assert_eq!(2, record.environment_vars.len());
        assert_eq!(record.environment_vars.get("LAMELLAR_A").unwrap(), "A");
        assert_eq!(record.environment_vars.get("LAMELLAR_B").unwrap(), "B");
    }

    #[test]
    fn test_write_appends_json_lines() {
        let path = env::temp_dir().join(format!("run_record_{}.jsonl", std::process::id()));
        let _ = fs::remove_file(&path);

        let mut record = RunRecord::new("solver", 0, 2);
        record.with_output("epochs", "3".into());
        record.write(&path);
        record.write(&path);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let parsed = json::parse(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["output"]["epochs"], "3");
        fs::remove_file(&path).unwrap();
    }
}
