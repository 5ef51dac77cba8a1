//! Guess injection (spec.md §4.5.6).
//!
//! Before a unit's inlet ports are loaded from their current values, any
//! guess the caller supplied for a still-free member is applied first.
//! Rules, straight from the reference: already-fixed members are left
//! alone; expression-typed members can never be guessed directly; an
//! indexed member needs an [`crate::model::GuessValue::Indexed`] guess;
//! an extensive member needs either a [`crate::model::GuessValue::PerArc`]
//! guess, or (when the arc is 1-to-1, i.e. has no per-arc expanded
//! variable) a plain scalar.

use crate::error::{Error, Result};
use crate::ledger::ScopedFix;
use crate::model::{GuessValue, Guesses, InletPort, Model};

/// Apply every guess targeting `port` on `unit`, fixing the members they
/// cover through `scoped`.
pub fn apply_guesses<M: Model>(
    scoped: &mut ScopedFix<M>,
    guesses: &Guesses<M::Unit>,
    unit: M::Unit,
    port: &InletPort<M::Var>,
) -> Result<()> {
    let Some(member_guesses) = guesses.get(&(unit, port.name.clone())) else {
        return Ok(());
    };

    for member in &port.members {
        let Some(guess) = member_guesses.get(&member.name) else {
            continue;
        };
        if scoped.model().is_fixed(member.var) {
            continue;
        }
        if member.is_expression {
            return Err(Error::GuessTypeError {
                port: port.name.clone(),
                member: member.name.clone(),
                reason: "expression-typed members cannot be guessed directly; fix the \
                         variables the expression depends on instead"
                    .to_string(),
            });
        }

        match guess {
            GuessValue::Indexed(values) => {
                let Some(idx) = &member.index else {
                    return Err(Error::GuessTypeError {
                        port: port.name.clone(),
                        member: member.name.clone(),
                        reason: "indexed guess given for a scalar member".to_string(),
                    });
                };
                let Some(&value) = values.get(idx) else {
                    return Err(Error::GuessTypeError {
                        port: port.name.clone(),
                        member: member.name.clone(),
                        reason: format!("indexed guess has no entry for index '{idx}'"),
                    });
                };
                scoped.fix(member.var, value);
            }
            GuessValue::Scalar(value) => {
                if member.is_extensive {
                    return Err(Error::GuessTypeError {
                        port: port.name.clone(),
                        member: member.name.clone(),
                        reason: "extensive members fed by more than one arc need a per-arc \
                                 guess, not a single scalar"
                            .to_string(),
                    });
                }
                scoped.fix(member.var, *value);
            }
            GuessValue::PerArc(pairs) => {
                if !member.is_extensive {
                    return Err(Error::GuessTypeError {
                        port: port.name.clone(),
                        member: member.name.clone(),
                        reason: "per-arc guess given for a non-extensive member".to_string(),
                    });
                }
                for &(arc, value) in pairs {
                    if let Some(var) = scoped.model().extensive_arc_variable(arc, &member.name) {
                        if !scoped.model().is_fixed(var) {
                            scoped.fix(var, value);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeIndex;
    use crate::model::{ArcConstraint, OutletPort, PortMember};
    use std::collections::{HashMap, HashSet};

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    struct V(u32);

    struct FakeModel {
        fixed: HashSet<V>,
        values: HashMap<V, f64>,
    }

    impl Model for FakeModel {
        type Var = V;
        type Unit = u32;
        fn is_fixed(&self, var: V) -> bool {
            self.fixed.contains(&var)
        }
        fn fix(&mut self, var: V, value: f64) {
            self.fixed.insert(var);
            self.values.insert(var, value);
        }
        fn free(&mut self, var: V) {
            self.fixed.remove(&var);
        }
        fn current_value(&self, var: V) -> Option<f64> {
            self.values.get(&var).copied()
        }
        fn inlet_ports(&self, _unit: u32) -> Vec<InletPort<V>> {
            Vec::new()
        }
        fn outlet_ports(&self, _unit: u32) -> Vec<OutletPort<V>> {
            Vec::new()
        }
        fn evaluate(&mut self, _unit: u32) -> crate::error::Result<()> {
            Ok(())
        }
        fn arc_constraints(&self, _arc: EdgeIndex) -> Vec<ArcConstraint<V>> {
            Vec::new()
        }
        fn extensive_arc_variable(&self, _arc: EdgeIndex, _member: &str) -> Option<V> {
            None
        }
        fn fix_extensive_total(&mut self, _unit: u32, _member: &str, _total: f64) {}
        fn tear_arc_value(&self, _arc: EdgeIndex, _var: V) -> Option<f64> {
            None
        }
    }

    fn scalar_port(var: V) -> InletPort<V> {
        InletPort {
            name: "in".to_string(),
            incoming_arcs: vec![],
            members: vec![PortMember {
                name: "flow".to_string(),
                var,
                index: None,
                is_extensive: false,
                is_expression: false,
            }],
        }
    }

    #[test]
    fn scalar_guess_fixes_free_member() {
        let mut model = FakeModel {
            fixed: HashSet::new(),
            values: HashMap::new(),
        };
        let port = scalar_port(V(1));
        let mut guesses: Guesses<u32> = HashMap::new();
        guesses.insert(
            (0, "in".to_string()),
            HashMap::from([("flow".to_string(), GuessValue::Scalar(42.0))]),
        );
        let mut scoped = ScopedFix::new(&mut model);
        apply_guesses(&mut scoped, &guesses, 0, &port).unwrap();
        assert_eq!(scoped.model().current_value(V(1)), Some(42.0));
    }

    #[test]
    fn already_fixed_member_is_not_overwritten() {
        let mut model = FakeModel {
            fixed: HashSet::new(),
            values: HashMap::new(),
        };
        model.fix(V(1), 5.0);
        let port = scalar_port(V(1));
        let mut guesses: Guesses<u32> = HashMap::new();
        guesses.insert(
            (0, "in".to_string()),
            HashMap::from([("flow".to_string(), GuessValue::Scalar(42.0))]),
        );
        let mut scoped = ScopedFix::new(&mut model);
        apply_guesses(&mut scoped, &guesses, 0, &port).unwrap();
        assert_eq!(scoped.model().current_value(V(1)), Some(5.0));
    }

    #[test]
    fn expression_member_guess_errors() {
        let mut model = FakeModel {
            fixed: HashSet::new(),
            values: HashMap::new(),
        };
        let port = InletPort {
            name: "in".to_string(),
            incoming_arcs: vec![],
            members: vec![PortMember {
                name: "flow".to_string(),
                var: V(1),
                index: None,
                is_extensive: false,
                is_expression: true,
            }],
        };
        let mut guesses: Guesses<u32> = HashMap::new();
        guesses.insert(
            (0, "in".to_string()),
            HashMap::from([("flow".to_string(), GuessValue::Scalar(1.0))]),
        );
        let mut scoped = ScopedFix::new(&mut model);
        let err = apply_guesses(&mut scoped, &guesses, 0, &port).unwrap_err();
        assert!(matches!(err, Error::GuessTypeError { .. }));
    }

    #[test]
    fn scalar_guess_on_extensive_member_errors() {
        let mut model = FakeModel {
            fixed: HashSet::new(),
            values: HashMap::new(),
        };
        let port = InletPort {
            name: "in".to_string(),
            incoming_arcs: vec![],
            members: vec![PortMember {
                name: "flow".to_string(),
                var: V(1),
                index: None,
                is_extensive: true,
                is_expression: false,
            }],
        };
        let mut guesses: Guesses<u32> = HashMap::new();
        guesses.insert(
            (0, "in".to_string()),
            HashMap::from([("flow".to_string(), GuessValue::Scalar(1.0))]),
        );
        let mut scoped = ScopedFix::new(&mut model);
        let err = apply_guesses(&mut scoped, &guesses, 0, &port).unwrap_err();
        assert!(matches!(err, Error::GuessTypeError { .. }));
    }
}
