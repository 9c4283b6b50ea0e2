//! Out-of-process engine speaking SMT-LIB2 to an external solver binary.
//!
//! Each `check` writes the declared variables and assertions to a temporary
//! `.smt2` file, runs the solver on it and parses `sat`/`unsat`/`unknown`
//! followed by the `(get-model)` answer. Variables are sent as `v<index>`
//! so caller-supplied names never need quoting.
use super::{Model, SatResult, SolverEngine, SolverError};
use crate::model::{Constraint, Integer, LinearExpr, Var};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{ErrorKind, Write};
use std::process::Command;
use tracing::{debug, warn};

/// How to launch the external solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtlibConfig {
    /// Solver executable, looked up on `PATH` if not absolute.
    pub binary: String,
    /// Arguments placed before the script path.
    pub args: Vec<String>,
    /// Passed as z3's `-T:<seconds>` flag (rounded up). `0` disables it.
    pub timeout_ms: u64,
}

impl Default for SmtlibConfig {
    fn default() -> Self {
        Self {
            binary: "z3".to_string(),
            args: vec!["-smt2".to_string()],
            timeout_ms: 5000,
        }
    }
}

// --- Rendering ---

fn symbol(var: Var) -> String { format!("v{}", var.index()) }

fn render_int(value: Integer) -> String {
    if value < 0 { format!("(- {})", value.unsigned_abs()) } else { value.to_string() }
}

fn render_expr(expr: &LinearExpr) -> String {
    let mut parts: Vec<String> = expr
        .terms()
        .iter()
        .map(|&(var, coefficient)| match coefficient {
            1 => symbol(var),
            c => format!("(* {} {})", render_int(c), symbol(var)),
        })
        .collect();
    if expr.constant_part() != 0 || parts.is_empty() {
        parts.push(render_int(expr.constant_part()));
    }
    if parts.len() == 1 { parts.remove(0) } else { format!("(+ {})", parts.join(" ")) }
}

pub fn render_constraint(constraint: &Constraint) -> String {
    format!(
        "({} {} {})",
        constraint.relation.symbol(),
        render_expr(&constraint.lhs),
        render_expr(&constraint.rhs)
    )
}

/// A full `QF_LIA` script. `names[i]` is the variable behind `v<i>`; it only
/// appears in comments.
pub fn render_script(names: &[String], constraints: &[&Constraint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "(set-logic QF_LIA)");
    let _ = writeln!(out, "(set-option :produce-models true)");
    for (idx, name) in names.iter().enumerate() {
        let _ = writeln!(out, "(declare-const {} Int) ; {:?}", symbol(Var::new(idx)), name);
    }
    for constraint in constraints {
        let _ = writeln!(out, "(assert {})", render_constraint(constraint));
    }
    let _ = writeln!(out, "(check-sat)");
    let _ = writeln!(out, "(get-model)");
    out
}

// --- Output parsing ---

#[derive(Debug, Clone, PartialEq, Eq)]
enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '(' | ')' => tokens.push(ch.to_string()),
            ';' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' { break; }
                    chars.next();
                }
            }
            '"' | '|' => {
                let mut tok = ch.to_string();
                for c in chars.by_ref() {
                    tok.push(c);
                    if c == ch { break; }
                }
                tokens.push(tok);
            }
            c if c.is_whitespace() => {}
            c => {
                let mut tok = c.to_string();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || next == '(' || next == ')' { break; }
                    tok.push(next);
                    chars.next();
                }
                tokens.push(tok);
            }
        }
    }
    tokens
}

fn parse_sexprs(input: &str) -> Result<Vec<SExpr>, SolverError> {
    let mut stack: Vec<Vec<SExpr>> = vec![Vec::new()];
    for tok in tokenize(input) {
        match tok.as_str() {
            "(" => stack.push(Vec::new()),
            ")" => {
                if stack.len() < 2 {
                    return Err(SolverError::Parse("unbalanced ')'".into()));
                }
                if let Some(list) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.push(SExpr::List(list));
                    }
                }
            }
            _ => {
                if let Some(top) = stack.last_mut() {
                    top.push(SExpr::Atom(tok));
                }
            }
        }
    }
    if stack.len() != 1 {
        return Err(SolverError::Parse("unbalanced '('".into()));
    }
    Ok(stack.pop().unwrap_or_default())
}

fn parse_int(expr: &SExpr) -> Option<Integer> {
    match expr {
        SExpr::Atom(a) => a.parse().ok(),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(op), inner] if op == "-" => parse_int(inner)?.checked_neg(),
            _ => None,
        },
    }
}

fn collect_definitions(expr: &SExpr, model: &mut Model) -> Result<(), SolverError> {
    if let SExpr::List(items) = expr {
        if let [SExpr::Atom(head), SExpr::Atom(name), _, _, value] = items.as_slice() {
            if head == "define-fun" {
                let Some(idx) = name.strip_prefix('v').and_then(|n| n.parse::<usize>().ok()) else {
                    return Ok(());
                };
                let value = parse_int(value)
                    .ok_or_else(|| SolverError::Parse(format!("non-integer value for {}", name)))?;
                model.insert(Var::new(idx), value);
                return Ok(());
            }
        }
        for item in items {
            collect_definitions(item, model)?;
        }
    }
    Ok(())
}

/// Splits solver output into the verdict line and the model, if any.
fn parse_output(stdout: &str) -> Result<(SatResult, Option<Model>), SolverError> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let status = lines.next().ok_or_else(|| SolverError::Parse("empty solver output".into()))?;
    match status {
        "unsat" => Ok((SatResult::Unsat, None)),
        "unknown" => Ok((SatResult::Unknown("solver returned unknown".into()), None)),
        "sat" => {
            let rest: Vec<&str> = lines.collect();
            let mut model = Model::new();
            for expr in parse_sexprs(&rest.join("\n"))? {
                collect_definitions(&expr, &mut model)?;
            }
            Ok((SatResult::Sat, Some(model)))
        }
        other => Err(SolverError::Parse(format!("unexpected status line '{}'", other))),
    }
}

// --- Engine ---

#[derive(Debug, Clone, Default)]
pub struct SmtlibEngine {
    config: SmtlibConfig,
    names: Vec<String>,
    constraints: Vec<Constraint>,
    model: Option<Model>,
}

impl SmtlibEngine {
    pub fn new(config: SmtlibConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn config(&self) -> &SmtlibConfig { &self.config }

    /// The script the next `check` would send.
    pub fn script(&self) -> String {
        let constraints: Vec<&Constraint> = self.constraints.iter().collect();
        render_script(&self.names, &constraints)
    }

    fn run(&self, script: &str) -> Result<String, SolverError> {
        let mut file = tempfile::Builder::new()
            .prefix("tally-")
            .suffix(".smt2")
            .tempfile()
            .map_err(|e| SolverError::ExecutionFailed(format!("Failed to create temp file: {}", e)))?;
        file.write_all(script.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SolverError::ExecutionFailed(format!("Failed to write script: {}", e)))?;

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&self.config.args).arg(file.path());
        if self.config.timeout_ms > 0 {
            cmd.arg(format!("-T:{}", self.config.timeout_ms.div_ceil(1000)));
        }
        debug!(binary = %self.config.binary, script = %file.path().display(), "Running SMT solver");

        let output = cmd.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => SolverError::Unavailable(format!("'{}' not found", self.config.binary)),
            _ => SolverError::ExecutionFailed(e.to_string()),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim_start().starts_with("timeout") {
            return Err(SolverError::Timeout(self.config.timeout_ms));
        }
        if stdout.trim().is_empty() && !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SolverError::ExecutionFailed(format!("{}: {}", output.status, stderr.trim())));
        }
        Ok(stdout)
    }
}

impl SolverEngine for SmtlibEngine {
    fn declare_int(&mut self, name: &str) -> Var {
        let var = Var::new(self.names.len());
        self.names.push(name.to_string());
        var
    }

    fn assert(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        if let Some(var) = constraint.vars().find(|v| v.index() >= self.names.len()) {
            return Err(SolverError::UnknownVariable(var));
        }
        self.constraints.push(constraint.clone());
        self.model = None;
        Ok(())
    }

    fn reset(&mut self) {
        self.names.clear();
        self.constraints.clear();
        self.model = None;
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        self.model = None;
        let stdout = self.run(&self.script())?;
        let (result, model) = parse_output(&stdout)?;
        if let SatResult::Unknown(reason) = &result {
            warn!(%reason, "SMT solver could not decide");
        }
        self.model = model;
        Ok(result)
    }

    fn model(&self) -> Result<Model, SolverError> {
        self.model
            .clone()
            .ok_or_else(|| SolverError::NoModel("last check was not satisfiable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0")]
    #[case(1500, "1500")]
    #[case(-2000, "(- 2000)")]
    fn test_render_int(#[case] value: Integer, #[case] expected: &str) {
        assert_eq!(render_int(value), expected);
    }

    #[test]
    fn test_render_constraint_shapes() {
        let x = Var(0);
        let y = Var(1);
        assert_eq!(render_constraint(&Constraint::at_least(x, LinearExpr::constant(0))), "(>= v0 0)");

        let mut sum = LinearExpr::var(x);
        sum.add_term(y, -2);
        sum.add_constant(7);
        assert_eq!(render_constraint(&Constraint::equal(sum, LinearExpr::constant(-1))), "(= (+ v0 (* (- 2) v1) 7) (- 1))");
    }

    #[test]
    fn test_script_declares_before_asserting() {
        let names = vec!["balance".to_string(), "txn_a b".to_string()];
        let c = Constraint::greater_than(Var(1), LinearExpr::constant(0));
        let script = render_script(&names, &[&c]);

        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "(set-logic QF_LIA)");
        assert_eq!(lines[2], "(declare-const v0 Int) ; \"balance\"");
        assert_eq!(lines[3], "(declare-const v1 Int) ; \"txn_a b\"");
        assert_eq!(lines[4], "(assert (> v1 0))");
        assert_eq!(lines[5..], ["(check-sat)", "(get-model)"]);
    }

    #[test]
    fn test_parse_multiline_model_with_negative_values() {
        let stdout = "sat\n(\n  (define-fun v1 () Int\n    (- 2000))\n  (define-fun v0 () Int\n    1500)\n)\n";
        let (result, model) = parse_output(stdout).unwrap();
        assert_eq!(result, SatResult::Sat);
        let model = model.unwrap();
        assert_eq!(model.get(Var(0)), Some(1500));
        assert_eq!(model.get(Var(1)), Some(-2000));
    }

    #[test]
    fn test_parse_legacy_model_wrapper() {
        let stdout = "sat\n(model\n  (define-fun v0 () Int 3)\n)\n";
        let (_, model) = parse_output(stdout).unwrap();
        assert_eq!(model.unwrap().get(Var(0)), Some(3));
    }

    #[test]
    fn test_parse_unsat_ignores_model_error() {
        let stdout = "unsat\n(error \"line 9 column 10: model is not available\")\n";
        let (result, model) = parse_output(stdout).unwrap();
        assert_eq!(result, SatResult::Unsat);
        assert!(model.is_none());
    }

    #[rstest]
    #[case("")]
    #[case("segfault\n")]
    #[case("sat\n((define-fun v0 () Int 3)\n")]
    fn test_parse_rejects_garbage(#[case] stdout: &str) {
        assert!(matches!(parse_output(stdout), Err(SolverError::Parse(_))));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let mut engine = SmtlibEngine::new(SmtlibConfig {
            binary: "definitely-not-a-real-solver-binary".into(),
            ..Default::default()
        });
        let x = engine.declare_int("balance");
        engine.assert(&Constraint::at_least(x, LinearExpr::constant(0))).unwrap();

        assert!(matches!(engine.check(), Err(SolverError::Unavailable(_))));
        assert!(engine.model().is_err());
    }

    #[test]
    fn test_reset_empties_script() {
        let mut engine = SmtlibEngine::default();
        let x = engine.declare_int("balance");
        engine.assert(&Constraint::at_least(x, LinearExpr::constant(0))).unwrap();
        assert!(engine.script().contains("(assert"));

        engine.reset();
        assert!(!engine.script().contains("declare-const"));
    }

    /// Runs `body` through `sh` in place of a solver binary.
    #[cfg(unix)]
    fn scripted_engine(dir: &tempfile::TempDir, body: &str) -> SmtlibEngine {
        let script = dir.path().join("solver.sh");
        std::fs::write(&script, body).unwrap();
        let mut engine = SmtlibEngine::new(SmtlibConfig {
            binary: "sh".into(),
            args: vec![script.display().to_string()],
            timeout_ms: 1500,
        });
        let x = engine.declare_int("balance");
        engine.assert(&Constraint::at_least(x, LinearExpr::constant(0))).unwrap();
        engine
    }

    #[cfg(unix)]
    #[test]
    fn test_run_passes_script_then_timeout_flag() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"
            grep -q '(declare-const v0 Int)' "$1" || exit 4
            [ "$2" = "-T:2" ] || exit 5
            printf 'sat\n((define-fun v0 () Int 42))\n'
        "#;
        let mut engine = scripted_engine(&dir, body);

        assert_eq!(engine.check(), Ok(SatResult::Sat));
        assert_eq!(engine.model().unwrap().get(Var(0)), Some(42));
    }

    #[cfg(unix)]
    #[rstest]
    #[case("echo unsat", Ok(SatResult::Unsat))]
    #[case("echo unknown", Ok(SatResult::Unknown("solver returned unknown".into())))]
    #[case("echo timeout", Err(SolverError::Timeout(1500)))]
    fn test_run_maps_solver_answers(#[case] body: &str, #[case] expected: Result<SatResult, SolverError>) {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = scripted_engine(&dir, body);

        assert_eq!(engine.check(), expected);
        assert!(engine.model().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_failure_is_execution_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = scripted_engine(&dir, "echo 'bad flag' >&2; exit 1");

        match engine.check() {
            Err(SolverError::ExecutionFailed(message)) => assert!(message.contains("bad flag")),
            other => panic!("Expected ExecutionFailed, got {:?}", other),
        }
    }
}
