//! QASM emitters for serializing circuits.

use rimfax_ir::{Circuit, Instruction, InstructionKind, StandardGate};

use crate::error::ParseResult;

/// Emit a circuit as QASM 3 source code.
pub fn emit(circuit: &Circuit) -> ParseResult<String> {
    Emitter::new(Dialect::Qasm3).emit_circuit(circuit)
}

/// Emit a circuit as QASM 2.0 source code.
///
/// Register declarations use the QASM2 style (`qreg q[n];` / `creg c[n];`)
/// and measurements use `measure q[i] -> c[i];`.
pub fn emit_qasm2(circuit: &Circuit) -> ParseResult<String> {
    Emitter::new(Dialect::Qasm2).emit_circuit(circuit)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Qasm2,
    Qasm3,
}

struct Emitter {
    dialect: Dialect,
    output: String,
}

impl Emitter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            output: String::new(),
        }
    }

    fn writeln(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn emit_circuit(&mut self, circuit: &Circuit) -> ParseResult<String> {
        match self.dialect {
            Dialect::Qasm3 => {
                self.writeln("OPENQASM 3.0;");
                self.writeln("");
                if circuit.num_qubits() > 0 {
                    self.writeln(&format!("qubit[{}] q;", circuit.num_qubits()));
                }
                if circuit.num_clbits() > 0 {
                    self.writeln(&format!("bit[{}] c;", circuit.num_clbits()));
                }
            }
            Dialect::Qasm2 => {
                self.writeln("OPENQASM 2.0;");
                self.writeln("include \"qelib1.inc\";");
                if circuit.iter().any(rimfax_ir::Instruction::is_teleport) {
                    self.writeln("opaque teleport src, via, dest;");
                }
                self.writeln("");
                if circuit.num_qubits() > 0 {
                    self.writeln(&format!("qreg q[{}];", circuit.num_qubits()));
                }
                if circuit.num_clbits() > 0 {
                    self.writeln(&format!("creg c[{}];", circuit.num_clbits()));
                }
            }
        }
        if circuit.num_qubits() > 0 || circuit.num_clbits() > 0 {
            self.writeln("");
        }

        for instruction in circuit.iter() {
            self.emit_instruction(instruction);
        }

        Ok(self.output.clone())
    }

    fn emit_instruction(&mut self, instruction: &Instruction) {
        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                let line = format!(
                    "{} {};",
                    gate_text(*gate),
                    qubit_list(&instruction.qubits)
                );
                self.writeln(&line);
            }

            InstructionKind::ClassicallyControlled { gate, clbit } => {
                let body = format!(
                    "{} {};",
                    gate_text(*gate),
                    qubit_list(&instruction.qubits)
                );
                match self.dialect {
                    Dialect::Qasm3 => {
                        self.writeln(&format!("if (c[{}]) {{ {body} }}", clbit.0));
                    }
                    Dialect::Qasm2 => {
                        // QASM2 can only condition on a whole register; a
                        // one-bit creg per correction keeps the semantics.
                        self.writeln(&format!("if (c[{}] == 1) {body}", clbit.0));
                    }
                }
            }

            InstructionKind::Measure => {
                for (q, c) in instruction.qubits.iter().zip(&instruction.clbits) {
                    match self.dialect {
                        Dialect::Qasm3 => {
                            self.writeln(&format!("c[{}] = measure q[{}];", c.0, q.0));
                        }
                        Dialect::Qasm2 => {
                            self.writeln(&format!("measure q[{}] -> c[{}];", q.0, c.0));
                        }
                    }
                }
            }

            InstructionKind::Barrier => {
                if instruction.qubits.is_empty() {
                    self.writeln("barrier;");
                } else {
                    self.writeln(&format!("barrier {};", qubit_list(&instruction.qubits)));
                }
            }

            InstructionKind::Teleport => {
                self.writeln(&format!("teleport {};", qubit_list(&instruction.qubits)));
            }
        }
    }
}

fn qubit_list(qubits: &[rimfax_ir::QubitId]) -> String {
    qubits
        .iter()
        .map(|q| format!("q[{}]", q.0))
        .collect::<Vec<_>>()
        .join(", ")
}

fn gate_text(gate: StandardGate) -> String {
    match gate.angle() {
        Some(theta) => format!("{}({})", gate.name(), format_angle(theta)),
        None => gate.name().to_string(),
    }
}

/// Print an angle compactly; exact multiples of pi/4 render symbolically so
/// emitted files stay readable and parse back to the same value.
fn format_angle(theta: f64) -> String {
    let quarter = std::f64::consts::FRAC_PI_4;
    let quarters = theta / quarter;
    if (quarters - quarters.round()).abs() < 1e-12 && quarters.abs() < 64.0 {
        let n = quarters.round() as i64;
        return match n {
            0 => "0".to_string(),
            4 => "pi".to_string(),
            -4 => "-pi".to_string(),
            _ => format!("{n}*pi/4"),
        };
    }
    format!("{theta}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use rimfax_ir::QubitId;

    #[test]
    fn test_emit_qasm3_bell() {
        let circuit = Circuit::bell().unwrap();
        let qasm = emit(&circuit).unwrap();
        assert!(qasm.contains("OPENQASM 3.0;"));
        assert!(qasm.contains("qubit[2] q;"));
        assert!(qasm.contains("h q[0];"));
        assert!(qasm.contains("cx q[0], q[1];"));
        assert!(qasm.contains("c[0] = measure q[0];"));
    }

    #[test]
    fn test_emit_qasm2_bell() {
        let circuit = Circuit::bell().unwrap();
        let qasm = emit_qasm2(&circuit).unwrap();
        assert!(qasm.contains("OPENQASM 2.0;"));
        assert!(qasm.contains("qreg q[2];"));
        assert!(qasm.contains("measure q[0] -> c[0];"));
    }

    #[test]
    fn test_round_trip() {
        let mut circuit = Circuit::with_size("rt", 3, 3);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.rz(std::f64::consts::FRAC_PI_2, QubitId(2)).unwrap();
        circuit.swap(QubitId(1), QubitId(2)).unwrap();
        circuit.measure_all().unwrap();

        let qasm = emit(&circuit).unwrap();
        let reparsed = parse(&qasm).unwrap();

        assert_eq!(reparsed.num_qubits(), circuit.num_qubits());
        assert_eq!(reparsed.num_clbits(), circuit.num_clbits());
        assert_eq!(reparsed.instructions(), circuit.instructions());
    }

    #[test]
    fn test_round_trip_qasm2() {
        let mut circuit = Circuit::with_size("rt2", 2, 0);
        circuit.sdg(QubitId(0)).unwrap();
        circuit.cz(QubitId(0), QubitId(1)).unwrap();

        let qasm = emit_qasm2(&circuit).unwrap();
        let reparsed = parse(&qasm).unwrap();
        assert_eq!(reparsed.instructions(), circuit.instructions());
    }

    #[test]
    fn test_angle_formatting() {
        assert_eq!(format_angle(std::f64::consts::PI), "pi");
        assert_eq!(format_angle(-std::f64::consts::PI), "-pi");
        assert_eq!(format_angle(std::f64::consts::FRAC_PI_2), "2*pi/4");
        assert_eq!(format_angle(0.0), "0");
    }

    #[test]
    fn test_deterministic_emission() {
        let circuit = Circuit::ghz(4).unwrap();
        assert_eq!(emit(&circuit).unwrap(), emit(&circuit).unwrap());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use rimfax_ir::StandardGate;

        fn apply_step(circuit: &mut Circuit, op: u8, a: u32, b: u32) {
            let (a, b) = (QubitId(a), QubitId(b));
            match op % 8 {
                0 => { let _ = circuit.h(a); }
                1 => { let _ = circuit.s(a); }
                2 => { let _ = circuit.x(a); }
                3 => { let _ = circuit.rz(std::f64::consts::FRAC_PI_4, a); }
                4 => { let _ = circuit.push(rimfax_ir::Instruction::barrier([a])); }
                5 if a != b => { let _ = circuit.cx(a, b); }
                6 if a != b => { let _ = circuit.swap(a, b); }
                _ => {
                    let _ = circuit.push(rimfax_ir::Instruction::single_qubit_gate(
                        StandardGate::Sdg,
                        a,
                    ));
                }
            };
        }

        proptest! {
            #[test]
            fn emit_parse_round_trip(
                steps in proptest::collection::vec((0u8..8, 0u32..4, 0u32..4), 0..24),
            ) {
                let mut circuit = Circuit::with_size("rt", 4, 4);
                for (op, a, b) in steps {
                    apply_step(&mut circuit, op, a, b);
                }
                circuit.measure_all().unwrap();

                let qasm3 = emit(&circuit).unwrap();
                let parsed3 = parse(&qasm3).unwrap();
                prop_assert_eq!(parsed3.instructions(), circuit.instructions());

                let qasm2 = emit_qasm2(&circuit).unwrap();
                let parsed2 = parse(&qasm2).unwrap();
                prop_assert_eq!(parsed2.instructions(), circuit.instructions());
            }
        }
    }
}
