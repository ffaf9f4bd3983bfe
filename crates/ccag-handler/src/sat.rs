//! SAT encoding of a test model.
//!
//! Each parameter value is one boolean variable, numbered like its literal
//! in [`LiteralMap`] (variable index = literal - 1). Every parameter gets an
//! exactly-one constraint (at-least-one plus pairwise at-most-one), and
//! each model clause is added as-is. Validity of a partial test case is a
//! satisfiability query under the assumption that its fixed values hold.

use std::cell::RefCell;

use ccag_model::{LiteralMap, TestModel};
use varisat::{ExtendFormula, Lit, Solver, Var};

use crate::error::HandlerError;

pub struct SatOracle {
    solver: RefCell<Solver<'static>>,
    literals: LiteralMap,
    unconstrained: bool,
}

impl SatOracle {
    /// Encode `model` and check that at least one complete test case exists.
    pub fn new(model: &TestModel) -> Result<Self, HandlerError> {
        let literals = model.literal_map();
        let mut solver = Solver::new();

        for clause in structural_clauses(&literals) {
            solver.add_clause(&clause);
        }
        for clause in &model.constraints {
            let mut lits = Vec::with_capacity(clause.literals().len());
            for &literal in clause.literals() {
                literals.decode(literal)?;
                lits.push(to_lit(literal));
            }
            solver.add_clause(&lits);
        }

        match solver.solve() {
            Ok(true) => {}
            Ok(false) => {
                return Err(HandlerError::Unsatisfiable {
                    model: model.name.clone(),
                })
            }
            Err(e) => return Err(HandlerError::Solver(e.to_string())),
        }

        Ok(Self {
            solver: RefCell::new(solver),
            literals,
            unconstrained: model.constraints.is_empty(),
        })
    }

    /// Whether some completion of `test` satisfies every constraint.
    pub fn check(&self, test: &[Option<usize>]) -> Result<bool, HandlerError> {
        if self.unconstrained {
            return Ok(true);
        }
        let assumptions: Vec<Lit> = test
            .iter()
            .enumerate()
            .filter_map(|(p, v)| v.map(|v| self.literals.literal(p, v)))
            .map(|literal| Var::from_index(literal - 1).positive())
            .collect();

        let mut solver = self.solver.borrow_mut();
        solver.assume(&assumptions);
        solver
            .solve()
            .map_err(|e| HandlerError::Solver(e.to_string()))
    }
}

/// Exactly-one clauses for every parameter.
fn structural_clauses(literals: &LiteralMap) -> Vec<Vec<Lit>> {
    let mut clauses = Vec::new();
    for p in 0..literals.parameters() {
        let vars: Vec<Var> = (0..literals.arity(p))
            .map(|v| Var::from_index(literals.literal(p, v) - 1))
            .collect();

        clauses.push(vars.iter().map(|v| v.positive()).collect());
        for i in 0..vars.len() {
            for j in (i + 1)..vars.len() {
                clauses.push(vec![vars[i].negative(), vars[j].negative()]);
            }
        }
    }
    clauses
}

fn to_lit(literal: i64) -> Lit {
    let var = Var::from_index(literal.unsigned_abs() as usize - 1);
    if literal < 0 {
        var.negative()
    } else {
        var.positive()
    }
}
