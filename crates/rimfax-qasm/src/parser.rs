//! Recursive-descent parser for the `OpenQASM` subset.

use rustc_hash::FxHashMap;

use rimfax_ir::{Circuit, ClbitId, Instruction, QubitId, StandardGate};

use crate::error::{ParseError, ParseResult};
use crate::lexer::{Token, tokenize};

/// Parse a QASM source string into a [`Circuit`].
pub fn parse(source: &str) -> ParseResult<Circuit> {
    let mut parser = Parser::new(source)?;
    parser.parse_program()
}

/// A register declaration.
#[derive(Debug, Clone)]
struct Register {
    base: u32,
    size: u32,
}

/// Parser state.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    qregs: FxHashMap<String, Register>,
    cregs: FxHashMap<String, Register>,
}

impl Parser {
    fn new(source: &str) -> ParseResult<Self> {
        let tokens = tokenize(source).map_err(|(position, message)| {
            let (line, column) = line_column(source, position);
            ParseError::LexerError {
                line,
                column,
                message,
            }
        })?;
        Ok(Self {
            tokens,
            pos: 0,
            qregs: FxHashMap::default(),
            cregs: FxHashMap::default(),
        })
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<Token> {
        let found = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof(format!("expected {expected}")))?;
        if std::mem::discriminant(&found) != std::mem::discriminant(expected) {
            return Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(found)
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self
            .peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(token))
        {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.advance() {
            Some(Token::Identifier(name)) => Ok(name),
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "identifier".into(),
                found: other.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("expected identifier".into())),
        }
    }

    fn expect_int(&mut self) -> ParseResult<u64> {
        match self.advance() {
            Some(Token::IntLiteral(v)) => Ok(v),
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "integer".into(),
                found: other.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("expected integer".into())),
        }
    }

    // =========================================================================
    // Program structure
    // =========================================================================

    fn parse_program(&mut self) -> ParseResult<Circuit> {
        let mut circuit = Circuit::new("circuit");

        if self.consume(&Token::OpenQasm) {
            self.parse_version()?;
        }

        while !self.is_eof() {
            self.parse_statement(&mut circuit)?;
        }

        Ok(circuit)
    }

    fn parse_version(&mut self) -> ParseResult<()> {
        let version = match self.advance() {
            Some(Token::FloatLiteral(v)) => v.to_string(),
            Some(Token::IntLiteral(v)) => v.to_string(),
            Some(other) => return Err(ParseError::InvalidVersion(other.to_string())),
            None => return Err(ParseError::UnexpectedEof("expected version".into())),
        };
        if !matches!(version.as_str(), "2" | "2.0" | "3" | "3.0") {
            return Err(ParseError::InvalidVersion(version));
        }
        self.expect(&Token::Semicolon)?;
        Ok(())
    }

    fn parse_statement(&mut self, circuit: &mut Circuit) -> ParseResult<()> {
        match self.peek() {
            Some(Token::Include) => {
                self.advance();
                self.expect(&Token::StringLiteral(String::new()))?;
                self.expect(&Token::Semicolon)?;
                Ok(())
            }
            Some(Token::Qreg) => {
                self.advance();
                self.parse_qasm2_register(circuit, true)
            }
            Some(Token::Creg) => {
                self.advance();
                self.parse_qasm2_register(circuit, false)
            }
            Some(Token::Qubit) => {
                self.advance();
                self.parse_qasm3_register(circuit, true)
            }
            Some(Token::Bit) => {
                self.advance();
                self.parse_qasm3_register(circuit, false)
            }
            Some(Token::Measure) => {
                self.advance();
                self.parse_measure_arrow(circuit)
            }
            Some(Token::Barrier) => {
                self.advance();
                self.parse_barrier(circuit)
            }
            Some(Token::GateCX) => {
                self.advance();
                self.parse_gate(circuit, "cx".into())
            }
            Some(Token::Identifier(_)) => {
                let name = self.expect_identifier()?;
                // `c = measure q;` / `c[i] = measure q[j];`
                if self.peek() == Some(&Token::Equals)
                    || (self.peek() == Some(&Token::LBracket) && self.is_assign_measure())
                {
                    self.parse_measure_assign(circuit, name)
                } else {
                    self.parse_gate(circuit, name)
                }
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "statement".into(),
                found: other.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Lookahead for `ident[i] = measure ...` after the identifier.
    fn is_assign_measure(&self) -> bool {
        // pos is at '['; assignment form is `[ int ] =`
        matches!(
            (
                self.tokens.get(self.pos + 1),
                self.tokens.get(self.pos + 2),
                self.tokens.get(self.pos + 3),
            ),
            (
                Some(Token::IntLiteral(_)),
                Some(Token::RBracket),
                Some(Token::Equals),
            )
        )
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// `qreg q[n];` / `creg c[n];`
    fn parse_qasm2_register(&mut self, circuit: &mut Circuit, quantum: bool) -> ParseResult<()> {
        let name = self.expect_identifier()?;
        self.expect(&Token::LBracket)?;
        let size = self.expect_int()? as u32;
        self.expect(&Token::RBracket)?;
        self.expect(&Token::Semicolon)?;
        self.declare_register(circuit, name, size, quantum)
    }

    /// `qubit[n] q;` / `qubit q;` / `bit[n] c;` / `bit c;`
    fn parse_qasm3_register(&mut self, circuit: &mut Circuit, quantum: bool) -> ParseResult<()> {
        let size = if self.consume(&Token::LBracket) {
            let size = self.expect_int()? as u32;
            self.expect(&Token::RBracket)?;
            size
        } else {
            1
        };
        let name = self.expect_identifier()?;
        self.expect(&Token::Semicolon)?;
        self.declare_register(circuit, name, size, quantum)
    }

    fn declare_register(
        &mut self,
        circuit: &mut Circuit,
        name: String,
        size: u32,
        quantum: bool,
    ) -> ParseResult<()> {
        let table = if quantum { &self.qregs } else { &self.cregs };
        if table.contains_key(&name) {
            return Err(ParseError::DuplicateDeclaration(name));
        }
        let base = if quantum {
            let ids = circuit.add_qreg(&name, size);
            ids.first().map_or(0, |q| q.0)
        } else {
            let ids = circuit.add_creg(&name, size);
            ids.first().map_or(0, |c| c.0)
        };
        let table = if quantum {
            &mut self.qregs
        } else {
            &mut self.cregs
        };
        table.insert(name, Register { base, size });
        Ok(())
    }

    // =========================================================================
    // Operands
    // =========================================================================

    /// Parse `name` or `name[i]` and resolve against a register table.
    fn parse_operand(&mut self, quantum: bool) -> ParseResult<Vec<u32>> {
        let name = self.expect_identifier()?;
        let table = if quantum { &self.qregs } else { &self.cregs };
        let reg = table
            .get(&name)
            .ok_or_else(|| ParseError::UndefinedIdentifier(name.clone()))?
            .clone();

        if self.consume(&Token::LBracket) {
            let index = self.expect_int()? as usize;
            self.expect(&Token::RBracket)?;
            if index >= reg.size as usize {
                return Err(ParseError::IndexOutOfBounds {
                    register: name,
                    index,
                    size: reg.size as usize,
                });
            }
            Ok(vec![reg.base + index as u32])
        } else {
            Ok((reg.base..reg.base + reg.size).collect())
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// `measure q[i] -> c[j];` with whole-register broadcast.
    fn parse_measure_arrow(&mut self, circuit: &mut Circuit) -> ParseResult<()> {
        let qubits = self.parse_operand(true)?;
        self.expect(&Token::Arrow)?;
        let clbits = self.parse_operand(false)?;
        self.expect(&Token::Semicolon)?;
        self.push_measures(circuit, &qubits, &clbits)
    }

    /// `c = measure q;` (the leading identifier is already consumed).
    fn parse_measure_assign(&mut self, circuit: &mut Circuit, creg: String) -> ParseResult<()> {
        let reg = self
            .cregs
            .get(&creg)
            .ok_or_else(|| ParseError::UndefinedIdentifier(creg.clone()))?
            .clone();

        let clbits = if self.consume(&Token::LBracket) {
            let index = self.expect_int()? as usize;
            self.expect(&Token::RBracket)?;
            if index >= reg.size as usize {
                return Err(ParseError::IndexOutOfBounds {
                    register: creg,
                    index,
                    size: reg.size as usize,
                });
            }
            vec![reg.base + index as u32]
        } else {
            (reg.base..reg.base + reg.size).collect()
        };

        self.expect(&Token::Equals)?;
        self.expect(&Token::Measure)?;
        let qubits = self.parse_operand(true)?;
        self.expect(&Token::Semicolon)?;
        self.push_measures(circuit, &qubits, &clbits)
    }

    fn push_measures(
        &mut self,
        circuit: &mut Circuit,
        qubits: &[u32],
        clbits: &[u32],
    ) -> ParseResult<()> {
        if qubits.len() != clbits.len() {
            return Err(ParseError::Generic(format!(
                "measure maps {} qubits to {} bits",
                qubits.len(),
                clbits.len()
            )));
        }
        for (&q, &c) in qubits.iter().zip(clbits) {
            circuit.measure(QubitId(q), ClbitId(c))?;
        }
        Ok(())
    }

    /// `barrier;` / `barrier q;` / `barrier q[0], q[1];`
    fn parse_barrier(&mut self, circuit: &mut Circuit) -> ParseResult<()> {
        let mut qubits = vec![];
        if !self.consume(&Token::Semicolon) {
            loop {
                qubits.extend(self.parse_operand(true)?);
                if !self.consume(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Semicolon)?;
        }
        circuit.push(Instruction::barrier(qubits.into_iter().map(QubitId)))?;
        Ok(())
    }

    fn parse_gate(&mut self, circuit: &mut Circuit, name: String) -> ParseResult<()> {
        if name == "opaque" {
            // Opaque declarations carry no circuit content.
            while let Some(token) = self.advance() {
                if token == Token::Semicolon {
                    break;
                }
            }
            return Ok(());
        }
        if name == "teleport" {
            return self.parse_teleport(circuit);
        }

        let mut params = vec![];
        if self.consume(&Token::LParen) {
            loop {
                params.push(self.parse_expression()?);
                if !self.consume(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }

        let gate = resolve_gate(&name, &params)?;

        let mut operands = vec![];
        loop {
            operands.push(self.parse_operand(true)?);
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semicolon)?;

        let arity = gate.num_qubits() as usize;
        if arity == 1 && operands.len() == 1 {
            // Whole-register broadcast for single-qubit gates.
            for &q in &operands[0] {
                circuit.push(Instruction::single_qubit_gate(gate, QubitId(q)))?;
            }
            return Ok(());
        }

        if operands.len() != arity || operands.iter().any(|ops| ops.len() != 1) {
            return Err(ParseError::Generic(format!(
                "gate '{name}' expects {arity} single-qubit operands"
            )));
        }
        let qubits: Vec<QubitId> = operands.iter().map(|ops| QubitId(ops[0])).collect();
        circuit.push(Instruction::gate(gate, qubits))?;
        Ok(())
    }

    /// `teleport q[s], q[v], q[d];`
    fn parse_teleport(&mut self, circuit: &mut Circuit) -> ParseResult<()> {
        let mut operands = vec![];
        loop {
            operands.push(self.parse_operand(true)?);
            if !self.consume(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semicolon)?;
        if operands.len() != 3 || operands.iter().any(|ops| ops.len() != 1) {
            return Err(ParseError::Generic(
                "teleport expects 3 single-qubit operands".into(),
            ));
        }
        circuit.push(Instruction::teleport(
            QubitId(operands[0][0]),
            QubitId(operands[1][0]),
            QubitId(operands[2][0]),
        ))?;
        Ok(())
    }

    // =========================================================================
    // Constant expressions
    // =========================================================================

    fn parse_expression(&mut self) -> ParseResult<f64> {
        let mut value = self.parse_term()?;
        loop {
            if self.consume(&Token::Plus) {
                value += self.parse_term()?;
            } else if self.consume(&Token::Minus) {
                value -= self.parse_term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_term(&mut self) -> ParseResult<f64> {
        let mut value = self.parse_factor()?;
        loop {
            if self.consume(&Token::Star) {
                value *= self.parse_factor()?;
            } else if self.consume(&Token::Slash) {
                value /= self.parse_factor()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_factor(&mut self) -> ParseResult<f64> {
        match self.advance() {
            Some(Token::Minus) => Ok(-self.parse_factor()?),
            Some(Token::Pi) => Ok(std::f64::consts::PI),
            Some(Token::FloatLiteral(v)) => Ok(v),
            Some(Token::IntLiteral(v)) => Ok(v as f64),
            Some(Token::LParen) => {
                let value = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "expression".into(),
                found: other.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("expected expression".into())),
        }
    }
}

/// 1-based line and column of a byte offset in the source.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let prefix = &source[..offset.min(source.len())];
    let line_start = prefix.rfind('\n').map_or(0, |p| p + 1);
    let line = prefix.matches('\n').count() + 1;
    let column = prefix[line_start..].chars().count() + 1;
    (line, column)
}

/// Resolve a gate name plus parameters to a [`StandardGate`].
fn resolve_gate(name: &str, params: &[f64]) -> ParseResult<StandardGate> {
    let expect_params = |n: usize| -> ParseResult<()> {
        if params.len() == n {
            Ok(())
        } else {
            Err(ParseError::WrongParameterCount {
                gate: name.to_string(),
                expected: n,
                got: params.len(),
            })
        }
    };

    let gate = match name {
        "id" => StandardGate::I,
        "x" => StandardGate::X,
        "y" => StandardGate::Y,
        "z" => StandardGate::Z,
        "h" => StandardGate::H,
        "s" => StandardGate::S,
        "sdg" => StandardGate::Sdg,
        "sx" => StandardGate::SX,
        "sxdg" => StandardGate::SXdg,
        "t" => StandardGate::T,
        "tdg" => StandardGate::Tdg,
        "rx" => {
            expect_params(1)?;
            return Ok(StandardGate::Rx(params[0]));
        }
        "ry" => {
            expect_params(1)?;
            return Ok(StandardGate::Ry(params[0]));
        }
        "rz" => {
            expect_params(1)?;
            return Ok(StandardGate::Rz(params[0]));
        }
        "cx" => StandardGate::CX,
        "cy" => StandardGate::CY,
        "cz" => StandardGate::CZ,
        "swap" => StandardGate::Swap,
        "ccx" => StandardGate::CCX,
        _ => return Err(ParseError::UnknownGate(name.to_string())),
    };
    expect_params(0)?;
    Ok(gate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qasm2_bell() {
        let circuit = parse(
            "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\ncreg c[2];\nh q[0];\ncx q[0], q[1];\nmeasure q[0] -> c[0];\nmeasure q[1] -> c[1];\n",
        )
        .unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.num_clbits(), 2);
        assert_eq!(circuit.num_gates(), 2);
        assert_eq!(circuit.depth(), 3);
    }

    #[test]
    fn test_parse_qasm3_bell() {
        let circuit = parse(
            "OPENQASM 3.0;\nqubit[2] q;\nbit[2] c;\nh q[0];\ncx q[0], q[1];\nc = measure q;\n",
        )
        .unwrap();
        assert_eq!(circuit.num_gates(), 2);
        assert_eq!(circuit.iter().filter(|i| i.is_measure()).count(), 2);
    }

    #[test]
    fn test_parse_rotation_expression() {
        let circuit = parse("OPENQASM 2.0;\nqreg q[1];\nrz(-3*pi/4) q[0];\n").unwrap();
        let gate = circuit.instructions()[0].as_gate().unwrap();
        let angle = gate.angle().unwrap();
        assert!((angle + 3.0 * std::f64::consts::PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_broadcast_single_qubit() {
        let circuit = parse("OPENQASM 2.0;\nqreg q[3];\nh q;\n").unwrap();
        assert_eq!(circuit.num_gates(), 3);
    }

    #[test]
    fn test_parse_cx_builtin_alias() {
        let circuit = parse("OPENQASM 2.0;\nqreg q[2];\nCX q[0], q[1];\n").unwrap();
        assert_eq!(circuit.instructions()[0].name(), "cx");
    }

    #[test]
    fn test_parse_barrier() {
        let circuit = parse("OPENQASM 2.0;\nqreg q[2];\nbarrier q;\n").unwrap();
        assert!(circuit.instructions()[0].is_barrier());
        assert_eq!(circuit.instructions()[0].qubits.len(), 2);
    }

    #[test]
    fn test_unknown_gate() {
        let result = parse("OPENQASM 2.0;\nqreg q[1];\nfoo q[0];\n");
        assert!(matches!(result, Err(ParseError::UnknownGate(_))));
    }

    #[test]
    fn test_undefined_register() {
        let result = parse("OPENQASM 2.0;\nqreg q[1];\nh r[0];\n");
        assert!(matches!(result, Err(ParseError::UndefinedIdentifier(_))));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let result = parse("OPENQASM 2.0;\nqreg q[1];\nh q[4];\n");
        assert!(matches!(result, Err(ParseError::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_duplicate_register() {
        let result = parse("OPENQASM 2.0;\nqreg q[1];\nqreg q[2];\n");
        assert!(matches!(result, Err(ParseError::DuplicateDeclaration(_))));
    }

    #[test]
    fn test_lexer_error_reports_line_and_column() {
        let result = parse("OPENQASM 2.0;\nqreg q[1];\nh @;\n");
        match result {
            Err(ParseError::LexerError { line, column, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, 3);
            }
            other => panic!("expected LexerError, got {other:?}"),
        }
    }

    #[test]
    fn test_line_column_helper() {
        let source = "ab\ncde\nf";
        assert_eq!(line_column(source, 0), (1, 1));
        assert_eq!(line_column(source, 4), (2, 2));
        assert_eq!(line_column(source, 7), (3, 1));
    }
}
