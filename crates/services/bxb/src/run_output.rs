use std::collections::HashMap;

use bx_toolchain::{BuildPartition, ResultLine};
use uuid::Uuid;

use crate::suite::Suite;

/// Logs and results collected for each case of a suite run.
pub struct BxRunOutput<'a> {
    pub suite: &'a Suite,
    pub logs: HashMap<Uuid, Vec<String>>,
    pub results: HashMap<Uuid, Vec<ResultLine>>,
}

impl<'a> BxRunOutput<'a> {
    pub fn new(suite: &'a Suite) -> Self {
        Self {
            suite,
            logs: HashMap::new(),
            results: HashMap::new(),
        }
    }

    /// Attribute a line printed by `partition`'s program. Result lines belong
    /// to the case they name, everything else to the representative.
    pub fn record_line(&mut self, partition: &BuildPartition, line: String) {
        let mut owner = partition.representative().id;
        if let Some(result) = ResultLine::parse(&line) {
            if let Some(case) = partition.cases().iter().find(|c| c.name == result.case) {
                owner = case.id;
                self.results.entry(owner).or_default().push(result);
            }
        }
        self.logs.entry(owner).or_default().push(line);
    }

    pub fn record_message(&mut self, partition: &BuildPartition, message: String) {
        self.logs
            .entry(partition.representative().id)
            .or_default()
            .push(message);
    }
}
