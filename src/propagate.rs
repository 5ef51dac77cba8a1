//! Arc value propagation (spec.md §4.5.3).
//!
//! Once a unit's outlet expressions have been transiently fixed, each of
//! its outgoing arcs links that expression to the destination port's
//! variables through the arc's expanded block. This module classifies and
//! discharges each such constraint:
//!
//! - both sides already fixed: verify they agree within tolerance, or
//!   raise [`Error::OverdeterminedArc`];
//! - exactly one free variable, entering linearly: solve for it directly
//!   and fix it;
//! - anything else: raise [`Error::UnderdeterminedArc`] (non-linear or
//!   more than one free variable) or [`Error::NonEqualityOnExpandedBlock`]
//!   (an inequality where only equalities are expected).

use crate::error::{Error, Result};
use crate::graph::EdgeIndex;
use crate::ledger::ScopedFix;
use crate::model::{ArcConstraint, Model};

/// Discharge every constraint on `arc`'s expanded block, fixing any
/// variable it can solve for directly on `model` and erroring on the first
/// constraint it cannot resolve.
///
/// A variable this resolves is the *destination* side of the arc, not the
/// source unit whose outlet scope is currently propagating — so it is
/// fixed straight on `model` rather than through the source's [`ScopedFix`].
/// It is appended to `dest_ledger` instead, so the caller can release it
/// once the destination unit's own turn has consumed it (spec.md §4.5.3:
/// "recording it in the destination unit's fixed-input ledger").
pub fn propagate_arc<M: Model>(
    model: &mut M,
    dest_ledger: &mut Vec<M::Var>,
    arc: EdgeIndex,
    almost_equal_tol: f64,
) -> Result<()> {
    let constraints = model.arc_constraints(arc);
    for constraint in constraints {
        match constraint {
            ArcConstraint::Determined { name, lhs, rhs } => {
                if (lhs - rhs).abs() > almost_equal_tol {
                    return Err(Error::OverdeterminedArc {
                        edge: arc,
                        constraint: name,
                        lhs,
                        rhs,
                        tol: almost_equal_tol,
                    });
                }
            }
            ArcConstraint::OneFreeVariable {
                coeff,
                constant,
                target,
                var,
                ..
            } => {
                let value = (target - constant) / coeff;
                model.fix(var, value);
                dest_ledger.push(var);
            }
            ArcConstraint::Underdetermined { name } => {
                return Err(Error::UnderdeterminedArc {
                    edge: arc,
                    constraint: name,
                })
            }
            ArcConstraint::NonEquality { name } => {
                return Err(Error::NonEqualityOnExpandedBlock {
                    edge: arc,
                    constraint: name,
                })
            }
        }
    }
    Ok(())
}

/// Sum an extensive member's per-arc expanded variables across every
/// incoming arc of an inlet port, fixing each one first (to `default` if
/// it has no current value) and finally fixing the port-level total via
/// [`Model::fix_extensive_total`].
pub fn load_extensive_member<M: Model>(
    scoped: &mut ScopedFix<M>,
    unit: M::Unit,
    member: &str,
    incoming_arcs: &[EdgeIndex],
    default: Option<f64>,
) -> Result<f64> {
    let mut total = 0.0;
    for &arc in incoming_arcs {
        let Some(var) = scoped.model().extensive_arc_variable(arc, member) else {
            continue;
        };
        if !scoped.model().is_fixed(var) {
            let value = scoped
                .model()
                .current_value(var)
                .or(default)
                .ok_or_else(|| Error::MissingValue {
                    unit: format!("{:?}", unit),
                    member: member.to_string(),
                })?;
            scoped.fix(var, value);
        }
        total += scoped.model().current_value(var).unwrap_or(0.0);
    }
    scoped.model_mut().fix_extensive_total(unit, member, total);
    Ok(total)
}
