//! Stabilizer tableau over GF(2).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use rimfax_ir::{Circuit, InstructionKind, StandardGate};

use crate::error::{SynthError, SynthResult};

/// One Pauli row: X part, Z part, and sign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PauliRow {
    /// X components, one bit per qubit.
    pub x: Vec<bool>,
    /// Z components, one bit per qubit.
    pub z: Vec<bool>,
    /// Sign bit: `true` encodes a leading minus.
    pub sign: bool,
}

impl PauliRow {
    fn identity(n: usize) -> Self {
        Self {
            x: vec![false; n],
            z: vec![false; n],
            sign: false,
        }
    }
}

/// A stabilizer tableau: a binary matrix of shape `r x (2n+1)`.
///
/// `r = n` rows describe a stabilizer state; `r = 2n` rows additionally carry
/// the destabilizers and describe a full Clifford unitary. Row order follows
/// the Aaronson–Gottesman convention: destabilizers first, stabilizers last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tableau {
    num_qubits: usize,
    rows: Vec<PauliRow>,
}

impl Tableau {
    /// The identity stabilizer tableau: row i stabilized by `Z_i`.
    pub fn identity(num_qubits: usize) -> Self {
        let mut rows = Vec::with_capacity(num_qubits);
        for i in 0..num_qubits {
            let mut row = PauliRow::identity(num_qubits);
            row.z[i] = true;
            rows.push(row);
        }
        Self { num_qubits, rows }
    }

    /// The identity tableau with destabilizers: `X_i` rows then `Z_i` rows.
    pub fn identity_with_destabilizers(num_qubits: usize) -> Self {
        let mut rows = Vec::with_capacity(2 * num_qubits);
        for i in 0..num_qubits {
            let mut row = PauliRow::identity(num_qubits);
            row.x[i] = true;
            rows.push(row);
        }
        for i in 0..num_qubits {
            let mut row = PauliRow::identity(num_qubits);
            row.z[i] = true;
            rows.push(row);
        }
        Self { num_qubits, rows }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of rows (`n` or `2n`).
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether this tableau carries destabilizer rows.
    pub fn has_destabilizers(&self) -> bool {
        self.rows.len() == 2 * self.num_qubits
    }

    /// The rows, destabilizers first when present.
    pub fn rows(&self) -> &[PauliRow] {
        &self.rows
    }

    // =========================================================================
    // Gate application (Aaronson–Gottesman update rules)
    // =========================================================================

    /// Apply a Hadamard on `q`.
    pub fn apply_h(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.x[q] & row.z[q];
            let tmp = row.x[q];
            row.x[q] = row.z[q];
            row.z[q] = tmp;
        }
    }

    /// Apply an S gate on `q`.
    pub fn apply_s(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.x[q] & row.z[q];
            row.z[q] ^= row.x[q];
        }
    }

    /// Apply an S-dagger gate on `q`.
    pub fn apply_sdg(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.x[q] & !row.z[q];
            row.z[q] ^= row.x[q];
        }
    }

    /// Apply a Pauli-X on `q`.
    pub fn apply_x(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.z[q];
        }
    }

    /// Apply a Pauli-Y on `q`.
    pub fn apply_y(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.x[q] ^ row.z[q];
        }
    }

    /// Apply a Pauli-Z on `q`.
    pub fn apply_z(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.x[q];
        }
    }

    /// Apply a sqrt(X) gate on `q`.
    pub fn apply_sx(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.z[q] & !row.x[q];
            row.x[q] ^= row.z[q];
        }
    }

    /// Apply a sqrt(X)-dagger gate on `q`.
    pub fn apply_sxdg(&mut self, q: usize) {
        for row in &mut self.rows {
            row.sign ^= row.z[q] & row.x[q];
            row.x[q] ^= row.z[q];
        }
    }

    /// Apply a CNOT with control `c` and target `t`.
    pub fn apply_cx(&mut self, c: usize, t: usize) {
        for row in &mut self.rows {
            row.sign ^= row.x[c] & row.z[t] & (row.x[t] ^ row.z[c] ^ true);
            row.x[t] ^= row.x[c];
            row.z[c] ^= row.z[t];
        }
    }

    /// Apply a CZ with control `c` and target `t`.
    pub fn apply_cz(&mut self, c: usize, t: usize) {
        self.apply_h(t);
        self.apply_cx(c, t);
        self.apply_h(t);
    }

    /// Apply a CY with control `c` and target `t`.
    pub fn apply_cy(&mut self, c: usize, t: usize) {
        self.apply_sdg(t);
        self.apply_cx(c, t);
        self.apply_s(t);
    }

    /// Apply a SWAP between `a` and `b`.
    pub fn apply_swap(&mut self, a: usize, b: usize) {
        for row in &mut self.rows {
            row.x.swap(a, b);
            row.z.swap(a, b);
        }
    }

    /// Apply one standard gate.
    pub fn apply_gate(&mut self, gate: StandardGate, qubits: &[usize]) -> SynthResult<()> {
        match (gate, qubits) {
            (StandardGate::I, _) => {}
            (StandardGate::H, [q]) => self.apply_h(*q),
            (StandardGate::S, [q]) => self.apply_s(*q),
            (StandardGate::Sdg, [q]) => self.apply_sdg(*q),
            (StandardGate::X, [q]) => self.apply_x(*q),
            (StandardGate::Y, [q]) => self.apply_y(*q),
            (StandardGate::Z, [q]) => self.apply_z(*q),
            (StandardGate::SX, [q]) => self.apply_sx(*q),
            (StandardGate::SXdg, [q]) => self.apply_sxdg(*q),
            (StandardGate::CX, [c, t]) => self.apply_cx(*c, *t),
            (StandardGate::CZ, [c, t]) => self.apply_cz(*c, *t),
            (StandardGate::CY, [c, t]) => self.apply_cy(*c, *t),
            (StandardGate::Swap, [a, b]) => self.apply_swap(*a, *b),
            (gate, _) => {
                return Err(SynthError::Tableau(format!(
                    "gate '{}' is not a supported Clifford operation",
                    gate.name()
                )));
            }
        }
        Ok(())
    }

    /// Fold a circuit into a tableau, starting from the identity.
    ///
    /// Barriers are ignored; measurements and non-Clifford gates are errors.
    pub fn from_circuit(circuit: &Circuit, use_destabilizers: bool) -> SynthResult<Self> {
        let n = circuit.num_qubits();
        let mut tableau = if use_destabilizers {
            Self::identity_with_destabilizers(n)
        } else {
            Self::identity(n)
        };

        for inst in circuit.iter() {
            match &inst.kind {
                InstructionKind::Gate(gate) => {
                    let qubits: Vec<usize> = inst.qubits.iter().map(|q| q.0 as usize).collect();
                    tableau.apply_gate(*gate, &qubits)?;
                }
                InstructionKind::Barrier => {}
                other => {
                    return Err(SynthError::Tableau(format!(
                        "instruction '{:?}' has no tableau semantics",
                        other
                    )));
                }
            }
        }

        Ok(tableau)
    }
}

impl fmt::Display for Tableau {
    /// Rows as `x-bits z-bits sign` binary strings, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            for &b in &row.x {
                write!(f, "{}", u8::from(b))?;
            }
            for &b in &row.z {
                write!(f, "{}", u8::from(b))?;
            }
            writeln!(f, "{}", u8::from(row.sign))?;
        }
        Ok(())
    }
}

impl FromStr for Tableau {
    type Err = SynthError;

    /// Parse either the binary print format or Pauli strings (`+XZ`, `-IY`),
    /// one row per line or `;`-separated.
    fn from_str(s: &str) -> SynthResult<Self> {
        let lines: Vec<&str> = s
            .split(['\n', ';'])
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(SynthError::Tableau("empty tableau string".into()));
        }

        let binary = lines
            .iter()
            .all(|l| l.chars().all(|c| c == '0' || c == '1'));
        let rows: Vec<PauliRow> = if binary {
            lines
                .iter()
                .map(|l| parse_binary_row(l))
                .collect::<SynthResult<_>>()?
        } else {
            lines
                .iter()
                .map(|l| parse_pauli_row(l))
                .collect::<SynthResult<_>>()?
        };

        let num_qubits = rows[0].x.len();
        if rows.iter().any(|r| r.x.len() != num_qubits) {
            return Err(SynthError::Tableau("rows have differing widths".into()));
        }
        if rows.len() != num_qubits && rows.len() != 2 * num_qubits {
            return Err(SynthError::Tableau(format!(
                "{} rows do not fit {} qubits (expected n or 2n)",
                rows.len(),
                num_qubits
            )));
        }

        Ok(Self { num_qubits, rows })
    }
}

fn parse_binary_row(line: &str) -> SynthResult<PauliRow> {
    let bits: Vec<bool> = line.chars().map(|c| c == '1').collect();
    if bits.len() % 2 != 1 {
        return Err(SynthError::Tableau(format!(
            "binary row '{line}' must hold 2n+1 bits"
        )));
    }
    let n = bits.len() / 2;
    Ok(PauliRow {
        x: bits[..n].to_vec(),
        z: bits[n..2 * n].to_vec(),
        sign: bits[2 * n],
    })
}

fn parse_pauli_row(line: &str) -> SynthResult<PauliRow> {
    let mut chars = line.chars().peekable();
    let sign = match chars.peek() {
        Some('+') => {
            chars.next();
            false
        }
        Some('-') => {
            chars.next();
            true
        }
        _ => false,
    };

    let mut x = vec![];
    let mut z = vec![];
    for c in chars {
        match c {
            'I' | 'i' => {
                x.push(false);
                z.push(false);
            }
            'X' | 'x' => {
                x.push(true);
                z.push(false);
            }
            'Y' | 'y' => {
                x.push(true);
                z.push(true);
            }
            'Z' | 'z' => {
                x.push(false);
                z.push(true);
            }
            other => {
                return Err(SynthError::Tableau(format!(
                    "invalid Pauli character '{other}' in row '{line}'"
                )));
            }
        }
    }
    if x.is_empty() {
        return Err(SynthError::Tableau(format!("empty Pauli row '{line}'")));
    }
    Ok(PauliRow { x, z, sign })
}
