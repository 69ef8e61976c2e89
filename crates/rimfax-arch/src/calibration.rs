//! Calibration data: per-qubit and per-edge error rates.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ArchError, ArchResult};

/// One row of a device calibration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// The physical qubit this row describes.
    pub qubit: u16,
    /// Single-qubit gate error rate.
    pub single_qubit_error: f64,
    /// Readout error rate.
    pub readout_error: f64,
    /// T1 time in microseconds.
    pub t1: f64,
    /// T2 time in microseconds.
    pub t2: f64,
    /// CNOT error rates towards neighboring qubits, as `(target, rate)`.
    pub cnot_errors: Vec<(u16, f64)>,
}

impl CalibrationRecord {
    /// Parse a CSV line of the form
    /// `qubit, single_qubit_error, readout_error, t1, t2, cnot_errors`
    /// where `cnot_errors` encodes `target:rate` pairs separated by `;`.
    pub fn parse_line(line: &str) -> ArchResult<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 6 {
            return Err(ArchError::schema(format!(
                "calibration row has {} fields, expected 6: '{line}'",
                fields.len()
            )));
        }

        let parse_num = |s: &str, what: &str| -> ArchResult<f64> {
            s.parse::<f64>()
                .map_err(|_| ArchError::schema(format!("invalid {what} '{s}'")))
        };

        let qubit: u16 = fields[0]
            .parse()
            .map_err(|_| ArchError::schema(format!("invalid qubit index '{}'", fields[0])))?;

        let mut cnot_errors = vec![];
        if !fields[5].is_empty() {
            for pair in fields[5].split(';') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                let (target, rate) = pair.split_once(':').ok_or_else(|| {
                    ArchError::schema(format!("invalid cnot_errors entry '{pair}'"))
                })?;
                let target: u16 = target.trim().parse().map_err(|_| {
                    ArchError::schema(format!("invalid cnot target '{target}'"))
                })?;
                let rate = parse_num(rate.trim(), "cnot error rate")?;
                cnot_errors.push((target, rate));
            }
        }

        Ok(Self {
            qubit,
            single_qubit_error: parse_num(fields[1], "single-qubit error")?,
            readout_error: parse_num(fields[2], "readout error")?,
            t1: parse_num(fields[3], "t1")?,
            t2: parse_num(fields[4], "t2")?,
            cnot_errors,
        })
    }
}

/// Aggregated calibration data for a device.
#[derive(Debug, Clone, Default)]
pub struct Calibration {
    /// Single-qubit error rate per qubit.
    pub single_qubit_error: Vec<f64>,
    /// Readout error rate per qubit.
    pub readout_error: Vec<f64>,
    /// T1 per qubit, microseconds.
    pub t1: Vec<f64>,
    /// T2 per qubit, microseconds.
    pub t2: Vec<f64>,
    /// Directed CNOT error rate per coupling edge.
    pub cnot_error: FxHashMap<(u16, u16), f64>,
}

impl Calibration {
    /// Build calibration data from parsed records.
    ///
    /// `num_qubits` bounds the qubit indices; rows or CNOT entries referring
    /// outside the device are schema errors.
    pub fn from_records(num_qubits: usize, records: &[CalibrationRecord]) -> ArchResult<Self> {
        let mut cal = Self {
            single_qubit_error: vec![0.0; num_qubits],
            readout_error: vec![0.0; num_qubits],
            t1: vec![0.0; num_qubits],
            t2: vec![0.0; num_qubits],
            cnot_error: FxHashMap::default(),
        };

        for rec in records {
            let q = rec.qubit as usize;
            if q >= num_qubits {
                return Err(ArchError::schema(format!(
                    "calibration row for qubit {q} exceeds device size {num_qubits}"
                )));
            }
            cal.single_qubit_error[q] = rec.single_qubit_error;
            cal.readout_error[q] = rec.readout_error;
            cal.t1[q] = rec.t1;
            cal.t2[q] = rec.t2;
            for &(target, rate) in &rec.cnot_errors {
                if target as usize >= num_qubits {
                    return Err(ArchError::schema(format!(
                        "cnot error {}->{target} exceeds device size {num_qubits}",
                        rec.qubit
                    )));
                }
                cal.cnot_error.insert((rec.qubit, target), rate);
            }
        }

        Ok(cal)
    }

    /// Undirected CNOT error for an edge: the mean of the directed rates that
    /// are present, or 0 when neither direction is calibrated.
    pub fn edge_error(&self, u: u16, v: u16) -> f64 {
        let fwd = self.cnot_error.get(&(u, v));
        let bwd = self.cnot_error.get(&(v, u));
        match (fwd, bwd) {
            (Some(a), Some(b)) => (a + b) / 2.0,
            (Some(a), None) | (None, Some(a)) => *a,
            (None, None) => 0.0,
        }
    }
}
