//! Exact 0/1 branch-and-bound backend.
//!
//! Depth-first search over variable fixings with:
//! - bounds propagation on every constraint row (activity ranges, forced fixings)
//! - a linear-relaxation lower bound at every node (dense bounded simplex),
//!   after the cheap bound `fixed cost + sum of negative free costs` fails to prune
//! - an explicit branch stack and an undo trail instead of recursion
//! - optional decomposition into independent blocks (connected components of the
//!   variable/row incidence graph), each solved to optimality on its own
//!
//! A node whose relaxation is integral is solved outright. Otherwise the search
//! branches on the most fractional variable, rounded value first. If the
//! relaxation gives no answer the search falls back to branching in order of
//! ascending objective coefficient (ties by index), trying the value the
//! coefficient prefers first: 1 for negative costs, 0 otherwise. Among equally
//! good optima the search keeps the first one found, which makes results
//! reproducible run to run.

use std::time::{Duration, Instant};

use super::program::{BinaryProgram, BinarySolution, BinarySolver, SearchStats, OBJECTIVE_TOLERANCE};
use crate::common::FEASIBILITY_TOLERANCE;
use crate::config::SolverConfig;
use crate::errors::SolverError;
use super::relaxation::{solve_relaxation, RelaxedRow, Relaxation};
use crate::model::Relation;

/// Relaxation values this close to 0 or 1 count as integral.
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Built-in exact backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBound {
    config: SolverConfig,
}

impl BranchAndBound {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl BinarySolver for BranchAndBound {
    fn solve(&self, program: &BinaryProgram) -> Result<BinarySolution, SolverError> {
        let mut budget = Budget::new(&self.config);

        // Rows without terms never change; settle them up front.
        if program
            .constraints()
            .iter()
            .any(|c| c.terms.is_empty() && !c.relation.holds(0.0, c.rhs))
        {
            return Err(SolverError::Infeasible);
        }

        let blocks = if self.config.decompose {
            components(program)
        } else {
            vec![Block {
                vars: (0..program.num_vars()).collect(),
                rows: (0..program.constraints().len()).collect(),
            }]
        };

        let mut values = vec![false; program.num_vars()];
        let mut stats = SearchStats {
            components: blocks.len(),
            ..SearchStats::default()
        };
        let mut relaxations = 0;
        for block in &blocks {
            let mut search = Search::new(program, block);
            let local = search.run(&mut budget)?;
            stats.propagations += search.propagations;
            relaxations += search.relaxations;
            for (k, &var) in block.vars.iter().enumerate() {
                values[var] = local[k];
            }
        }
        stats.nodes = budget.nodes;

        log::debug!(
            "branch-and-bound: {} blocks, {} nodes, {} propagations, {} relaxations in {:?}",
            stats.components,
            stats.nodes,
            stats.propagations,
            relaxations,
            budget.start.elapsed()
        );

        Ok(BinarySolution {
            objective: program.evaluate(&values),
            values,
            stats,
        })
    }

    fn name(&self) -> &'static str {
        "branch-and-bound"
    }
}

/// Node and time limits shared by every block of one solve.
struct Budget {
    start: Instant,
    time_limit: Option<Duration>,
    node_limit: Option<u64>,
    nodes: u64,
}

impl Budget {
    fn new(config: &SolverConfig) -> Self {
        Self {
            start: Instant::now(),
            time_limit: config.time_limit(),
            node_limit: config.node_limit,
            nodes: 0,
        }
    }

    fn tick(&mut self) -> Result<(), SolverError> {
        self.nodes += 1;
        if let Some(limit) = self.node_limit {
            if self.nodes > limit {
                return Err(self.exhausted("node limit"));
            }
        }
        if let Some(limit) = self.time_limit {
            if self.start.elapsed() >= limit {
                return Err(self.exhausted("time limit"));
            }
        }
        Ok(())
    }

    fn exhausted(&self, limit: &'static str) -> SolverError {
        SolverError::LimitReached {
            limit,
            nodes: self.nodes,
            elapsed: self.start.elapsed(),
        }
    }
}

/// Variables and rows of one independent block (global indices, ascending).
#[derive(Debug)]
struct Block {
    vars: Vec<usize>,
    rows: Vec<usize>,
}

/// Connected components of the variable/row incidence graph.
fn components(program: &BinaryProgram) -> Vec<Block> {
    let n = program.num_vars();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for row in program.constraints() {
        if let Some(&(first, _)) = row.terms.first() {
            for &(j, _) in &row.terms[1..] {
                let (a, b) = (find(&mut parent, first), find(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut block_of = vec![usize::MAX; n];
    let mut blocks: Vec<Block> = Vec::new();
    for var in 0..n {
        let root = find(&mut parent, var);
        if block_of[root] == usize::MAX {
            block_of[root] = blocks.len();
            blocks.push(Block {
                vars: Vec::new(),
                rows: Vec::new(),
            });
        }
        blocks[block_of[root]].vars.push(var);
    }
    for (r, row) in program.constraints().iter().enumerate() {
        if let Some(&(first, _)) = row.terms.first() {
            let root = find(&mut parent, first);
            blocks[block_of[root]].rows.push(r);
        }
    }
    blocks
}

/// Constraint row with incrementally maintained activity range.
struct Row {
    terms: Vec<(usize, f64)>,
    relation: Relation,
    rhs: f64,
    /// Sum of coefficients of variables fixed to 1.
    fixed: f64,
    /// Sum of negative coefficients of free variables.
    free_min: f64,
    /// Sum of positive coefficients of free variables.
    free_max: f64,
}

impl Row {
    #[inline]
    fn lo(&self) -> f64 {
        self.fixed + self.free_min
    }

    #[inline]
    fn hi(&self) -> f64 {
        self.fixed + self.free_max
    }

    fn is_consistent(&self) -> bool {
        let tol = FEASIBILITY_TOLERANCE;
        match self.relation {
            Relation::Le => self.lo() <= self.rhs + tol,
            Relation::Ge => self.hi() >= self.rhs - tol,
            Relation::Eq => self.lo() <= self.rhs + tol && self.hi() >= self.rhs - tol,
        }
    }

    /// Value a free variable with coefficient `a` is forced to, `Err` if neither value fits.
    fn forced(&self, a: f64) -> Result<Option<bool>, ()> {
        let tol = FEASIBILITY_TOLERANCE;
        let (lo, hi) = (self.lo(), self.hi());
        let mut zero_ok = true;
        let mut one_ok = true;
        if self.relation != Relation::Ge {
            one_ok &= lo + a.max(0.0) <= self.rhs + tol;
            zero_ok &= lo - a.min(0.0) <= self.rhs + tol;
        }
        if self.relation != Relation::Le {
            one_ok &= hi + a.min(0.0) >= self.rhs - tol;
            zero_ok &= hi - a.max(0.0) >= self.rhs - tol;
        }
        match (zero_ok, one_ok) {
            (true, true) => Ok(None),
            (true, false) => Ok(Some(false)),
            (false, true) => Ok(Some(true)),
            (false, false) => Err(()),
        }
    }
}

struct Branch {
    var: usize,
    mark: usize,
    alternative: Option<bool>,
}

/// What to do with a consistent node.
enum Step {
    Prune,
    /// A feasible completion better than the incumbent; nothing below it is better.
    Solved(f64, Vec<bool>),
    Branch(usize, bool),
}

/// Search state of one block, in block-local indices.
struct Search {
    costs: Vec<f64>,
    rows: Vec<Row>,
    occurs: Vec<Vec<(usize, f64)>>,
    values: Vec<Option<bool>>,
    order: Vec<usize>,
    trail: Vec<usize>,
    queue: Vec<usize>,
    queued: Vec<bool>,
    fixed_cost: f64,
    free_negative: f64,
    propagations: u64,
    relaxations: u64,
}

impl Search {
    fn new(program: &BinaryProgram, block: &Block) -> Self {
        let mut local = vec![usize::MAX; program.num_vars()];
        for (k, &var) in block.vars.iter().enumerate() {
            local[var] = k;
        }
        let costs: Vec<f64> = block.vars.iter().map(|&v| program.objective()[v]).collect();

        let mut occurs = vec![Vec::new(); block.vars.len()];
        let rows: Vec<Row> = block
            .rows
            .iter()
            .enumerate()
            .map(|(r, &global)| {
                let c = &program.constraints()[global];
                let terms: Vec<(usize, f64)> =
                    c.terms.iter().map(|&(j, a)| (local[j], a)).collect();
                for &(j, a) in &terms {
                    occurs[j].push((r, a));
                }
                Row {
                    free_min: terms.iter().map(|&(_, a)| a.min(0.0)).sum(),
                    free_max: terms.iter().map(|&(_, a)| a.max(0.0)).sum(),
                    terms,
                    relation: c.relation,
                    rhs: c.rhs,
                    fixed: 0.0,
                }
            })
            .collect();

        let mut order: Vec<usize> = (0..costs.len()).collect();
        order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]).then(a.cmp(&b)));

        let num_rows = rows.len();
        Self {
            free_negative: costs.iter().map(|c| c.min(0.0)).sum(),
            values: vec![None; costs.len()],
            costs,
            rows,
            occurs,
            order,
            trail: Vec::new(),
            queue: (0..num_rows).collect(),
            queued: vec![true; num_rows],
            fixed_cost: 0.0,
            propagations: 0,
            relaxations: 0,
        }
    }

    fn assign(&mut self, var: usize, value: bool) {
        self.values[var] = Some(value);
        self.trail.push(var);
        let c = self.costs[var];
        self.free_negative -= c.min(0.0);
        if value {
            self.fixed_cost += c;
        }
        for &(r, a) in &self.occurs[var] {
            let row = &mut self.rows[r];
            if a < 0.0 {
                row.free_min -= a;
            } else {
                row.free_max -= a;
            }
            if value {
                row.fixed += a;
            }
            if !self.queued[r] {
                self.queued[r] = true;
                self.queue.push(r);
            }
        }
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else { break };
            let Some(value) = self.values[var].take() else {
                continue;
            };
            let c = self.costs[var];
            self.free_negative += c.min(0.0);
            if value {
                self.fixed_cost -= c;
            }
            for &(r, a) in &self.occurs[var] {
                let row = &mut self.rows[r];
                if a < 0.0 {
                    row.free_min += a;
                } else {
                    row.free_max += a;
                }
                if value {
                    row.fixed -= a;
                }
            }
        }
    }

    /// Run propagation to a fixpoint. `false` on a conflict.
    fn propagate(&mut self) -> bool {
        while let Some(r) = self.queue.pop() {
            self.queued[r] = false;
            self.propagations += 1;
            if !self.rows[r].is_consistent() {
                self.clear_queue();
                return false;
            }
            for k in 0..self.rows[r].terms.len() {
                let (j, a) = self.rows[r].terms[k];
                if self.values[j].is_some() {
                    continue;
                }
                match self.rows[r].forced(a) {
                    Ok(None) => {}
                    Ok(Some(value)) => self.assign(j, value),
                    Err(()) => {
                        self.clear_queue();
                        return false;
                    }
                }
            }
        }
        true
    }

    fn clear_queue(&mut self) {
        for r in self.queue.drain(..) {
            self.queued[r] = false;
        }
    }

    #[inline]
    fn bound(&self) -> f64 {
        self.fixed_cost + self.free_negative
    }

    fn next_free(&self) -> Option<usize> {
        self.order.iter().copied().find(|&v| self.values[v].is_none())
    }

    fn fallback(&self) -> Step {
        match self.next_free() {
            Some(var) => Step::Branch(var, self.costs[var] < 0.0),
            None => Step::Prune,
        }
    }

    /// Complete the current fixings with `fill` for free variables; `None` if a row fails.
    fn complete(&self, fill: impl Fn(usize) -> bool) -> Option<(f64, Vec<bool>)> {
        let values: Vec<bool> = self
            .values
            .iter()
            .enumerate()
            .map(|(j, v)| v.unwrap_or_else(|| fill(j)))
            .collect();
        let feasible = self.rows.iter().all(|row| {
            let lhs: f64 = row
                .terms
                .iter()
                .filter(|&&(j, _)| values[j])
                .map(|&(_, a)| a)
                .sum();
            row.relation.holds(lhs, row.rhs)
        });
        if !feasible {
            return None;
        }
        let objective = self
            .costs
            .iter()
            .zip(&values)
            .filter(|(_, &x)| x)
            .map(|(c, _)| c)
            .sum();
        Some((objective, values))
    }

    /// Bound the current node against `cutoff` and decide how to continue.
    fn explore(&mut self, cutoff: f64) -> Step {
        if self.bound() >= cutoff {
            return Step::Prune;
        }

        let mut column = vec![usize::MAX; self.values.len()];
        let mut free = Vec::new();
        for (j, v) in self.values.iter().enumerate() {
            if v.is_none() {
                column[j] = free.len();
                free.push(j);
            }
        }
        if free.is_empty() {
            return match self.complete(|_| false) {
                Some((objective, values)) if objective < cutoff => Step::Solved(objective, values),
                _ => Step::Prune,
            };
        }

        let costs: Vec<f64> = free.iter().map(|&j| self.costs[j]).collect();
        let rows: Vec<RelaxedRow> = self
            .rows
            .iter()
            .filter_map(|row| {
                let terms: Vec<(usize, f64)> = row
                    .terms
                    .iter()
                    .filter(|&&(j, _)| column[j] != usize::MAX)
                    .map(|&(j, a)| (column[j], a))
                    .collect();
                (!terms.is_empty()).then(|| RelaxedRow {
                    terms,
                    relation: row.relation,
                    rhs: row.rhs - row.fixed,
                })
            })
            .collect();

        self.relaxations += 1;
        let (objective, relaxed) = match solve_relaxation(&costs, &rows) {
            Relaxation::Infeasible => return Step::Prune,
            Relaxation::Unknown => return self.fallback(),
            Relaxation::Optimal { objective, values } => (objective, values),
        };
        let margin = 1e-6 * (1.0 + objective.abs());
        if self.fixed_cost + objective - margin >= cutoff {
            return Step::Prune;
        }

        let fractionality = |j: usize| {
            let v = relaxed[column[j]];
            v.min(1.0 - v)
        };
        let integral = free.iter().all(|&j| fractionality(j) <= INTEGRALITY_TOLERANCE);
        if integral {
            return match self.complete(|j| relaxed[column[j]] >= 0.5) {
                Some((objective, values)) if objective < cutoff => Step::Solved(objective, values),
                Some(_) => Step::Prune,
                None => self.fallback(),
            };
        }

        let mut pick: Option<(usize, f64)> = None;
        for &j in &self.order {
            if column[j] == usize::MAX {
                continue;
            }
            let f = fractionality(j);
            if pick.map_or(true, |(_, best)| f > best) {
                pick = Some((j, f));
            }
        }
        match pick {
            Some((var, _)) => Step::Branch(var, relaxed[column[var]] >= 0.5),
            None => self.fallback(),
        }
    }

    /// Depth-first search; returns the optimal block-local values.
    fn run(&mut self, budget: &mut Budget) -> Result<Vec<bool>, SolverError> {
        let mut best: Option<(f64, Vec<bool>)> = None;
        let mut stack: Vec<Branch> = Vec::new();
        let mut consistent = self.propagate();

        'search: loop {
            if consistent {
                budget.tick()?;
                let incumbent = best.as_ref().map_or(f64::INFINITY, |(obj, _)| *obj);
                match self.explore(incumbent - OBJECTIVE_TOLERANCE) {
                    Step::Prune => {}
                    Step::Solved(objective, values) => best = Some((objective, values)),
                    Step::Branch(var, value) => {
                        stack.push(Branch {
                            var,
                            mark: self.trail.len(),
                            alternative: Some(!value),
                        });
                        self.assign(var, value);
                        consistent = self.propagate();
                        continue 'search;
                    }
                }
            }

            // Backtrack to the deepest branch with an untried value.
            loop {
                let Some(top) = stack.last_mut() else {
                    break 'search;
                };
                let (var, mark) = (top.var, top.mark);
                match top.alternative.take() {
                    Some(value) => {
                        self.undo(mark);
                        self.assign(var, value);
                        consistent = self.propagate();
                        continue 'search;
                    }
                    None => {
                        stack.pop();
                        self.undo(mark);
                    }
                }
            }
        }

        best.map(|(_, values)| values).ok_or(SolverError::Infeasible)
    }
}
