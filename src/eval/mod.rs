// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
A reference evaluator for constructed trees.

This is not a production execution kernel; it evaluates a node over a
(time, frequency) cell grid, one cell at a time, so that the numeric
properties of the tree builders (static/dynamic agreement in particular) can
be tested. Parameters evaluate to their starting values.

The time axis is interpreted as local sidereal time in radians. This makes
[`NodeOp::Uvw`] evaluable without an ephemeris: the hour angle of a phase
centre is simply `time - ra`.
 */

mod error;

pub use error::EvalError;

use std::collections::HashMap;

use ndarray::Array2;

use crate::c64;
use crate::coord::UVW;
use crate::graph::{NodeGraph, NodeId, NodeOp};

/// An evaluation range: a time interval and a frequency interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeFreqDomain {
    /// Start and end of the time axis \[LST, radians\]
    pub time: (f64, f64),
    /// Start and end of the frequency axis \[Hz\]
    pub freq: (f64, f64),
}

impl TimeFreqDomain {
    pub fn new(time_start: f64, time_end: f64, freq_start: f64, freq_end: f64) -> Self {
        Self {
            time: (time_start, time_end),
            freq: (freq_start, freq_end),
        }
    }
}

/// A grid of cell centres over a [`TimeFreqDomain`].
#[derive(Clone, Debug)]
pub struct Cells {
    times: Vec<f64>,
    freqs: Vec<f64>,
}

impl Cells {
    /// Regularly-spaced cells; values are cell centres.
    pub fn regular(domain: TimeFreqDomain, num_times: usize, num_freqs: usize) -> Cells {
        let dt = (domain.time.1 - domain.time.0) / num_times as f64;
        let df = (domain.freq.1 - domain.freq.0) / num_freqs as f64;
        Cells {
            times: (0..num_times)
                .map(|i| domain.time.0 + (i as f64 + 0.5) * dt)
                .collect(),
            freqs: (0..num_freqs)
                .map(|i| domain.freq.0 + (i as f64 + 0.5) * df)
                .collect(),
        }
    }

    /// A single cell, useful for spot checks.
    pub fn single(time: f64, freq: f64) -> Cells {
        Cells {
            times: vec![time],
            freqs: vec![freq],
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    /// (num_times, num_freqs)
    pub fn shape(&self) -> (usize, usize) {
        (self.times.len(), self.freqs.len())
    }
}

/// The result of evaluating a node: a tensor of complex planes, each shaped
/// (num_times, num_freqs). A scalar result has one plane, a 2x2 matrix four
/// (row-major).
#[derive(Clone, Debug)]
pub struct Value {
    planes: Vec<Array2<c64>>,
}

impl Value {
    fn scalar(plane: Array2<c64>) -> Value {
        Value {
            planes: vec![plane],
        }
    }

    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, i: usize) -> &Array2<c64> {
        &self.planes[i]
    }

    /// The value of one plane at one cell.
    pub fn at(&self, plane: usize, time: usize, freq: usize) -> c64 {
        self.planes[plane][[time, freq]]
    }
}

/// Evaluate a node over the given cells. Results are memoized per call, so
/// shared subtrees are evaluated once.
pub fn evaluate(graph: &NodeGraph, node: NodeId, cells: &Cells) -> Result<Value, EvalError> {
    let mut evaluator = Evaluator {
        graph,
        cells,
        cache: HashMap::new(),
    };
    evaluator.eval(node)
}

struct Evaluator<'g> {
    graph: &'g NodeGraph,
    cells: &'g Cells,
    cache: HashMap<NodeId, Value>,
}

impl Evaluator<'_> {
    fn eval(&mut self, id: NodeId) -> Result<Value, EvalError> {
        if let Some(value) = self.cache.get(&id) {
            return Ok(value.clone());
        }
        let op = self.graph.op(id);
        let children: Vec<Value> = self
            .graph
            .children(id)
            .into_iter()
            .map(|c| self.eval(c))
            .collect::<Result<_, _>>()?;
        let value = self.apply(&op, children)?;
        self.cache.insert(id, value.clone());
        Ok(value)
    }

    fn full(&self, v: c64) -> Array2<c64> {
        Array2::from_elem(self.cells.shape(), v)
    }

    fn apply(&self, op: &NodeOp, children: Vec<Value>) -> Result<Value, EvalError> {
        match op {
            NodeOp::Constant(values) => Ok(Value {
                planes: values.iter().map(|&v| self.full(v)).collect(),
            }),
            NodeOp::Parm(spec) => Ok(Value::scalar(self.full(c64::new(spec.value, 0.0)))),
            NodeOp::Freq => Ok(Value::scalar(Array2::from_shape_fn(
                self.cells.shape(),
                |(_, j)| c64::new(self.cells.freqs[j], 0.0),
            ))),
            NodeOp::Time => Ok(Value::scalar(Array2::from_shape_fn(
                self.cells.shape(),
                |(i, _)| c64::new(self.cells.times[i], 0.0),
            ))),

            NodeOp::Add => fold(op, children, |a, b| a + b),
            NodeOp::Subtract => fold(op, children, |a, b| a - b),
            NodeOp::Multiply => fold(op, children, |a, b| a * b),
            NodeOp::Divide => fold(op, children, |a, b| a / b),
            NodeOp::Pow => fold(op, children, |a, b| a.powc(b)),

            NodeOp::Negate => unary(op, children, |v| -v),
            NodeOp::Sqrt => unary(op, children, |v| v.sqrt()),
            NodeOp::Sqr => unary(op, children, |v| v * v),
            NodeOp::Cos => unary(op, children, |v| v.cos()),
            NodeOp::Sin => unary(op, children, |v| v.sin()),
            NodeOp::Asin => unary(op, children, |v| v.asin()),
            NodeOp::Conj => unary(op, children, |v| v.conj()),
            NodeOp::Identity => {
                let [v] = take::<1>(op, children)?;
                Ok(v)
            }

            NodeOp::ToComplex => {
                let [re, im] = take::<2>(op, children)?;
                zip_scalars(op, &re, &im, |re, im| c64::new(re.re, im.re))
            }
            NodeOp::Polar => {
                let [amp, phase] = take::<2>(op, children)?;
                zip_scalars(op, &amp, &phase, |a, p| a * (c64::i() * p).exp())
            }

            NodeOp::Composer => Ok(Value {
                planes: children.into_iter().flat_map(|v| v.planes).collect(),
            }),
            NodeOp::Selector(indices) => {
                let [v] = take::<1>(op, children)?;
                let planes = indices
                    .iter()
                    .map(|&i| {
                        v.planes.get(i).cloned().ok_or(EvalError::SelectorOutOfRange {
                            index: i,
                            num_planes: v.planes.len(),
                        })
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value { planes })
            }
            NodeOp::Paster(index) => {
                let [mut v, patch] = take::<2>(op, children)?;
                if *index >= v.planes.len() {
                    return Err(EvalError::SelectorOutOfRange {
                        index: *index,
                        num_planes: v.planes.len(),
                    });
                }
                let patch = expect_planes(op, patch, 1)?;
                v.planes[*index] = patch.planes.into_iter().next().ok_or_else(|| {
                    EvalError::PlaneMismatch {
                        op: op_name(op),
                        expected: 1,
                        got: 0,
                    }
                })?;
                Ok(v)
            }

            NodeOp::Matrix22 => {
                let [m11, m12, m21, m22] = take::<4>(op, children)?;
                let mut planes = Vec::with_capacity(4);
                for v in [m11, m12, m21, m22] {
                    let v = expect_planes(op, v, 1)?;
                    planes.extend(v.planes);
                }
                Ok(Value { planes })
            }
            NodeOp::MatrixMultiply => matrix_multiply(op, children),
            NodeOp::ConjTranspose => {
                let [v] = take::<1>(op, children)?;
                match v.planes.len() {
                    1 => Ok(Value::scalar(v.planes[0].mapv(|x| x.conj()))),
                    4 => Ok(Value {
                        planes: vec![
                            v.planes[0].mapv(|x| x.conj()),
                            v.planes[2].mapv(|x| x.conj()),
                            v.planes[1].mapv(|x| x.conj()),
                            v.planes[3].mapv(|x| x.conj()),
                        ],
                    }),
                    n => Err(EvalError::PlaneMismatch {
                        op: op_name(op),
                        expected: 4,
                        got: n,
                    }),
                }
            }

            NodeOp::Lmn => {
                let [radec0, radec] = take::<2>(op, children)?;
                let radec0 = expect_planes(op, radec0, 2)?;
                let radec = expect_planes(op, radec, 2)?;
                let shape = self.cells.shape();
                let mut planes = vec![Array2::zeros(shape); 3];
                for ((i, j), _) in radec.planes[0].indexed_iter() {
                    let rd = crate::coord::RADec::new(
                        radec.planes[0][[i, j]].re,
                        radec.planes[1][[i, j]].re,
                    );
                    let rd0 = crate::coord::RADec::new(
                        radec0.planes[0][[i, j]].re,
                        radec0.planes[1][[i, j]].re,
                    );
                    let lmn = rd.to_lmn(rd0);
                    planes[0][[i, j]] = c64::new(lmn.l, 0.0);
                    planes[1][[i, j]] = c64::new(lmn.m, 0.0);
                    planes[2][[i, j]] = c64::new(lmn.n, 0.0);
                }
                Ok(Value { planes })
            }
            NodeOp::LmRaDec => {
                let [radec0, lm] = take::<2>(op, children)?;
                let radec0 = expect_planes(op, radec0, 2)?;
                let lm = expect_planes(op, lm, 2)?;
                let shape = self.cells.shape();
                let mut planes = vec![Array2::zeros(shape); 2];
                for ((i, j), _) in lm.planes[0].indexed_iter() {
                    let rd0 = crate::coord::RADec::new(
                        radec0.planes[0][[i, j]].re,
                        radec0.planes[1][[i, j]].re,
                    );
                    let rd = crate::coord::RADec::from_lm(
                        lm.planes[0][[i, j]].re,
                        lm.planes[1][[i, j]].re,
                        rd0,
                    );
                    planes[0][[i, j]] = c64::new(rd.ra, 0.0);
                    planes[1][[i, j]] = c64::new(rd.dec, 0.0);
                }
                Ok(Value { planes })
            }
            NodeOp::Uvw(xyz) => {
                let [radec0] = take::<1>(op, children)?;
                let radec0 = expect_planes(op, radec0, 2)?;
                let shape = self.cells.shape();
                let mut planes = vec![Array2::zeros(shape); 3];
                for ((i, j), _) in radec0.planes[0].indexed_iter() {
                    let ra0 = radec0.planes[0][[i, j]].re;
                    let dec0 = radec0.planes[1][[i, j]].re;
                    let ha = self.cells.times[i] - ra0;
                    let uvw = UVW::from_xyz(*xyz, ha, dec0);
                    planes[0][[i, j]] = c64::new(uvw.u, 0.0);
                    planes[1][[i, j]] = c64::new(uvw.v, 0.0);
                    planes[2][[i, j]] = c64::new(uvw.w, 0.0);
                }
                Ok(Value { planes })
            }
            NodeOp::VisPhaseShift => {
                let [lmn_1, uvw] = take::<2>(op, children)?;
                let lmn_1 = expect_planes(op, lmn_1, 3)?;
                let uvw = expect_planes(op, uvw, 3)?;
                let shape = self.cells.shape();
                let mut plane = Array2::zeros(shape);
                for ((i, j), v) in plane.indexed_iter_mut() {
                    let l = lmn_1.planes[0][[i, j]].re;
                    let m = lmn_1.planes[1][[i, j]].re;
                    let n_1 = lmn_1.planes[2][[i, j]].re;
                    let u = uvw.planes[0][[i, j]].re;
                    let v_ = uvw.planes[1][[i, j]].re;
                    let w = uvw.planes[2][[i, j]].re;
                    let phase = -crate::constants::TAU * self.cells.freqs[j]
                        / crate::constants::VEL_C
                        * (u * l + v_ * m + w * n_1);
                    *v = (c64::i() * phase).exp();
                }
                Ok(Value::scalar(plane))
            }

            NodeOp::Condeq => {
                let [lhs, rhs] = take::<2>(op, children)?;
                zip_broadcast(op, lhs, rhs, |a, b| a - b)
            }
            NodeOp::ReqSeq(index) => {
                if *index >= children.len() {
                    return Err(EvalError::SelectorOutOfRange {
                        index: *index,
                        num_planes: children.len(),
                    });
                }
                Ok(children.into_iter().nth(*index).ok_or_else(|| {
                    EvalError::NoChildren(op_name(op))
                })?)
            }
            NodeOp::Solver(_) => Err(EvalError::Unsupported(op_name(op))),
        }
    }
}

fn op_name(op: &NodeOp) -> String {
    // Variant name only; payloads are noise in error messages.
    let debug = format!("{op:?}");
    debug
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or("?")
        .to_string()
}

fn take<const N: usize>(op: &NodeOp, children: Vec<Value>) -> Result<[Value; N], EvalError> {
    let got = children.len();
    children
        .try_into()
        .map_err(|_| EvalError::ChildMismatch {
            op: op_name(op),
            expected: N,
            got,
        })
}

fn expect_planes(op: &NodeOp, v: Value, n: usize) -> Result<Value, EvalError> {
    if v.planes.len() == n {
        Ok(v)
    } else {
        Err(EvalError::PlaneMismatch {
            op: op_name(op),
            expected: n,
            got: v.planes.len(),
        })
    }
}

fn unary(
    op: &NodeOp,
    children: Vec<Value>,
    f: impl Fn(c64) -> c64,
) -> Result<Value, EvalError> {
    let [v] = take::<1>(op, children)?;
    Ok(Value {
        planes: v.planes.iter().map(|p| p.mapv(&f)).collect(),
    })
}

/// Fold a binary scalar function over n-ary children, broadcasting scalar
/// (1-plane) operands against tensor operands.
fn fold(
    op: &NodeOp,
    children: Vec<Value>,
    f: impl Fn(c64, c64) -> c64 + Copy,
) -> Result<Value, EvalError> {
    let mut iter = children.into_iter();
    let first = iter.next().ok_or_else(|| EvalError::NoChildren(op_name(op)))?;
    iter.try_fold(first, |acc, next| zip_broadcast(op, acc, next, f))
}

fn zip_broadcast(
    op: &NodeOp,
    a: Value,
    b: Value,
    f: impl Fn(c64, c64) -> c64,
) -> Result<Value, EvalError> {
    let (na, nb) = (a.planes.len(), b.planes.len());
    let planes = if na == nb {
        a.planes
            .iter()
            .zip(b.planes.iter())
            .map(|(pa, pb)| zip_planes(pa, pb, &f))
            .collect()
    } else if nb == 1 {
        a.planes
            .iter()
            .map(|pa| zip_planes(pa, &b.planes[0], &f))
            .collect()
    } else if na == 1 {
        b.planes
            .iter()
            .map(|pb| zip_planes(&a.planes[0], pb, &f))
            .collect()
    } else {
        return Err(EvalError::PlaneMismatch {
            op: op_name(op),
            expected: na,
            got: nb,
        });
    };
    Ok(Value { planes })
}

fn zip_planes(a: &Array2<c64>, b: &Array2<c64>, f: impl Fn(c64, c64) -> c64) -> Array2<c64> {
    let mut out = a.clone();
    out.zip_mut_with(b, |x, &y| *x = f(*x, y));
    out
}

fn zip_scalars(
    op: &NodeOp,
    a: &Value,
    b: &Value,
    f: impl Fn(c64, c64) -> c64,
) -> Result<Value, EvalError> {
    if a.planes.len() != 1 || b.planes.len() != 1 {
        return Err(EvalError::PlaneMismatch {
            op: op_name(op),
            expected: 1,
            got: a.planes.len().max(b.planes.len()),
        });
    }
    Ok(Value::scalar(zip_planes(&a.planes[0], &b.planes[0], f)))
}

/// Fold a 2x2 matrix product over the children. Scalar (1-plane) children
/// act as scalar factors.
fn matrix_multiply(op: &NodeOp, children: Vec<Value>) -> Result<Value, EvalError> {
    let mut iter = children.into_iter();
    let first = iter.next().ok_or_else(|| EvalError::NoChildren(op_name(op)))?;
    iter.try_fold(first, |acc, next| {
        match (acc.planes.len(), next.planes.len()) {
            (1, 1) => Ok(Value::scalar(zip_planes(
                &acc.planes[0],
                &next.planes[0],
                |a, b| a * b,
            ))),
            (1, 4) => Ok(Value {
                planes: next
                    .planes
                    .iter()
                    .map(|p| zip_planes(&acc.planes[0], p, |a, b| a * b))
                    .collect(),
            }),
            (4, 1) => Ok(Value {
                planes: acc
                    .planes
                    .iter()
                    .map(|p| zip_planes(p, &next.planes[0], |a, b| a * b))
                    .collect(),
            }),
            (4, 4) => {
                let shape = acc.planes[0].raw_dim();
                let mut planes = vec![Array2::<c64>::zeros(shape); 4];
                for ((i, j), _) in acc.planes[0].indexed_iter() {
                    let a = [
                        acc.planes[0][[i, j]],
                        acc.planes[1][[i, j]],
                        acc.planes[2][[i, j]],
                        acc.planes[3][[i, j]],
                    ];
                    let b = [
                        next.planes[0][[i, j]],
                        next.planes[1][[i, j]],
                        next.planes[2][[i, j]],
                        next.planes[3][[i, j]],
                    ];
                    planes[0][[i, j]] = a[0] * b[0] + a[1] * b[2];
                    planes[1][[i, j]] = a[0] * b[1] + a[1] * b[3];
                    planes[2][[i, j]] = a[2] * b[0] + a[3] * b[2];
                    planes[3][[i, j]] = a[2] * b[1] + a[3] * b[3];
                }
                Ok(Value { planes })
            }
            (expected, got) => Err(EvalError::PlaneMismatch {
                op: op_name(op),
                expected,
                got,
            }),
        }
    })
}
