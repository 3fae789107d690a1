//! Construction NFA and the determinize/minimize pipeline.
//!
//! Every operation in this crate builds an `Nfa` (epsilon moves, multiple
//! start states allowed) and funnels it through `into_dfa()`: subset
//! construction, trimming, Moore minimization, and canonical BFS
//! renumbering. Product-based operations (intersection, complement,
//! inclusion) work on DFAs directly.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::dfa::{Dfa, DfaState, coalesce};

/// Marker for the implicit dead state in pair constructions.
const DEAD: u32 = u32::MAX;

#[derive(Debug, Clone, Default)]
pub(crate) struct NfaState {
    pub(crate) accepting: bool,
    pub(crate) edges: Vec<(u8, u8, u32)>,
    pub(crate) eps: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Nfa {
    pub(crate) states: Vec<NfaState>,
    pub(crate) starts: Vec<u32>,
}

impl Nfa {
    pub(crate) fn new() -> Self {
        Nfa::default()
    }

    pub(crate) fn add_state(&mut self) -> u32 {
        self.states.push(NfaState::default());
        (self.states.len() - 1) as u32
    }

    pub(crate) fn set_start(&mut self, s: u32) {
        self.starts = vec![s];
    }

    pub(crate) fn add_start(&mut self, s: u32) {
        self.starts.push(s);
    }

    pub(crate) fn mark_accepting(&mut self, s: u32) {
        self.states[s as usize].accepting = true;
    }

    pub(crate) fn add_edge(&mut self, from: u32, lo: u8, hi: u8, to: u32) {
        self.states[from as usize].edges.push((lo, hi, to));
    }

    pub(crate) fn add_eps(&mut self, from: u32, to: u32) {
        self.states[from as usize].eps.push(to);
    }

    /// Chains fresh states reading `bytes` from `from`; returns the final state.
    pub(crate) fn add_literal_path(&mut self, from: u32, bytes: &[u8]) -> u32 {
        let mut cur = from;
        for &b in bytes {
            let next = self.add_state();
            self.add_edge(cur, b, b, next);
            cur = next;
        }
        cur
    }

    /// Copies `d` into this NFA. Returns the base offset (the copy's start
    /// state) and the ids of the copy's accepting states. When
    /// `keep_accepting` is false the copied states are all non-accepting,
    /// which lets callers rewire acceptance (concatenation, star).
    pub(crate) fn import_dfa(&mut self, d: &Dfa, keep_accepting: bool) -> (u32, Vec<u32>) {
        let base = self.states.len() as u32;
        let mut accepting = Vec::new();
        for (i, st) in d.states.iter().enumerate() {
            let id = self.add_state();
            if st.accepting {
                accepting.push(base + i as u32);
                if keep_accepting {
                    self.states[id as usize].accepting = true;
                }
            }
        }
        for (i, st) in d.states.iter().enumerate() {
            for &(lo, hi, t) in &st.edges {
                self.add_edge(base + i as u32, lo, hi, base + t);
            }
        }
        (base, accepting)
    }

    fn eps_close(&self, set: &mut BTreeSet<u32>) {
        let mut stack: Vec<u32> = set.iter().copied().collect();
        while let Some(s) = stack.pop() {
            for &t in &self.states[s as usize].eps {
                if set.insert(t) {
                    stack.push(t);
                }
            }
        }
    }

    /// Subset construction. The result is deterministic but not yet
    /// trimmed or minimal.
    fn determinize(&self) -> Dfa {
        let mut start: BTreeSet<u32> = self.starts.iter().copied().collect();
        self.eps_close(&mut start);

        let mut ids: HashMap<Vec<u32>, u32> = HashMap::new();
        let mut sets: Vec<Vec<u32>> = Vec::new();
        let start_key: Vec<u32> = start.into_iter().collect();
        ids.insert(start_key.clone(), 0);
        sets.push(start_key);
        let mut states: Vec<DfaState> = vec![DfaState::default()];

        let mut i = 0usize;
        while i < sets.len() {
            let set = sets[i].clone();
            states[i].accepting = set.iter().any(|&s| self.states[s as usize].accepting);

            let mut cuts: BTreeSet<u16> = BTreeSet::new();
            for &s in &set {
                for &(lo, hi, _) in &self.states[s as usize].edges {
                    cuts.insert(lo as u16);
                    cuts.insert(hi as u16 + 1);
                }
            }
            let cuts: Vec<u16> = cuts.into_iter().collect();
            let mut edges = Vec::new();
            for w in cuts.windows(2) {
                let (a, b) = (w[0], w[1] - 1);
                let mut tset: BTreeSet<u32> = BTreeSet::new();
                for &s in &set {
                    for &(lo, hi, t) in &self.states[s as usize].edges {
                        if lo as u16 <= a && a <= hi as u16 {
                            tset.insert(t);
                        }
                    }
                }
                if tset.is_empty() {
                    continue;
                }
                self.eps_close(&mut tset);
                let key: Vec<u32> = tset.into_iter().collect();
                let id = match ids.get(&key) {
                    Some(&id) => id,
                    None => {
                        let id = sets.len() as u32;
                        ids.insert(key.clone(), id);
                        sets.push(key);
                        states.push(DfaState::default());
                        id
                    }
                };
                edges.push((a as u8, b as u8, id));
            }
            coalesce(&mut edges);
            states[i].edges = edges;
            i += 1;
        }
        Dfa { states }
    }

    pub(crate) fn into_dfa(self) -> Dfa {
        minimize(&self.determinize())
    }
}

/// Drops states that are unreachable or cannot reach acceptance, then
/// renumbers the remainder in BFS order.
pub(crate) fn trim(dfa: &Dfa) -> Dfa {
    let n = dfa.states.len();
    let reach = dfa.reachable();

    let mut rev: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut queue = VecDeque::new();
    let mut co = vec![false; n];
    for (s, st) in dfa.states.iter().enumerate() {
        for &(_, _, t) in &st.edges {
            rev[t as usize].push(s as u32);
        }
        if st.accepting {
            co[s] = true;
            queue.push_back(s as u32);
        }
    }
    while let Some(s) = queue.pop_front() {
        for &p in &rev[s as usize] {
            if !co[p as usize] {
                co[p as usize] = true;
                queue.push_back(p);
            }
        }
    }

    let keep: Vec<bool> = (0..n).map(|s| reach[s] && co[s]).collect();
    if !keep[0] {
        return Dfa::empty_lang();
    }

    // BFS renumbering over kept states only.
    let mut remap = vec![DEAD; n];
    let mut order = Vec::new();
    remap[0] = 0;
    order.push(0u32);
    let mut queue = VecDeque::new();
    queue.push_back(0u32);
    while let Some(s) = queue.pop_front() {
        for &(_, _, t) in &dfa.states[s as usize].edges {
            if keep[t as usize] && remap[t as usize] == DEAD {
                remap[t as usize] = order.len() as u32;
                order.push(t);
                queue.push_back(t);
            }
        }
    }

    let mut states = Vec::with_capacity(order.len());
    for &s in &order {
        let st = &dfa.states[s as usize];
        let mut edges: Vec<(u8, u8, u32)> = st
            .edges
            .iter()
            .filter(|&&(_, _, t)| keep[t as usize])
            .map(|&(lo, hi, t)| (lo, hi, remap[t as usize]))
            .collect();
        edges.sort_unstable();
        coalesce(&mut edges);
        states.push(DfaState {
            accepting: st.accepting,
            edges,
        });
    }
    Dfa { states }
}

/// Moore minimization. Input may be any DFA; output is canonical.
pub(crate) fn minimize(dfa: &Dfa) -> Dfa {
    let t = trim(dfa);
    if t.is_empty_lang() {
        return t;
    }
    let n = t.states.len();

    // Class 0 is reserved for the implicit dead state; live classes start at 1.
    let mut class: Vec<u32> = t
        .states
        .iter()
        .map(|s| if s.accepting { 2 } else { 1 })
        .collect();
    let mut num_classes = 1 + class.iter().collect::<BTreeSet<_>>().len();

    loop {
        let mut sig_ids: BTreeMap<(u32, Vec<(u8, u8, u32)>), u32> = BTreeMap::new();
        let mut new_class = vec![0u32; n];
        for s in 0..n {
            // Complete the signature over the full byte space, gaps going
            // to the dead class 0.
            let mut sig: Vec<(u8, u8, u32)> = Vec::new();
            let mut next_free: u16 = 0;
            for &(lo, hi, tgt) in &t.states[s].edges {
                if (lo as u16) > next_free {
                    sig.push((next_free as u8, lo - 1, 0));
                }
                sig.push((lo, hi, class[tgt as usize]));
                next_free = hi as u16 + 1;
            }
            if next_free <= 255 {
                sig.push((next_free as u8, 255, 0));
            }
            coalesce(&mut sig);
            let next_id = sig_ids.len() as u32 + 1;
            let id = *sig_ids.entry((class[s], sig)).or_insert(next_id);
            new_class[s] = id;
        }
        let count = sig_ids.len() + 1;
        class = new_class;
        if count == num_classes {
            break;
        }
        num_classes = count;
    }

    // Quotient: one state per live class, representative transitions.
    let mut class_order: Vec<u32> = Vec::new();
    let mut class_pos: HashMap<u32, u32> = HashMap::new();
    class_pos.insert(class[0], 0);
    class_order.push(class[0]);
    for s in 0..n {
        if let std::collections::hash_map::Entry::Vacant(e) = class_pos.entry(class[s]) {
            e.insert(class_order.len() as u32);
            class_order.push(class[s]);
        }
    }
    let mut rep: HashMap<u32, usize> = HashMap::new();
    for s in 0..n {
        rep.entry(class[s]).or_insert(s);
    }
    let mut states = Vec::with_capacity(class_order.len());
    for &c in &class_order {
        let s = rep[&c];
        let st = &t.states[s];
        let mut edges: Vec<(u8, u8, u32)> = st
            .edges
            .iter()
            .map(|&(lo, hi, tgt)| (lo, hi, class_pos[&class[tgt as usize]]))
            .collect();
        edges.sort_unstable();
        coalesce(&mut edges);
        states.push(DfaState {
            accepting: st.accepting,
            edges,
        });
    }
    // Classes are transition-consistent, so one more trim pass only
    // renumbers into the canonical BFS order.
    trim(&Dfa { states })
}

pub(crate) fn union(a: &Dfa, b: &Dfa) -> Dfa {
    let mut nfa = Nfa::new();
    let (base_a, _) = nfa.import_dfa(a, true);
    let (base_b, _) = nfa.import_dfa(b, true);
    nfa.add_start(base_a);
    nfa.add_start(base_b);
    nfa.into_dfa()
}

pub(crate) fn concat(a: &Dfa, b: &Dfa) -> Dfa {
    let mut nfa = Nfa::new();
    let (base_a, acc_a) = nfa.import_dfa(a, false);
    let (base_b, _) = nfa.import_dfa(b, true);
    nfa.set_start(base_a);
    for s in acc_a {
        nfa.add_eps(s, base_b);
    }
    nfa.into_dfa()
}

pub(crate) fn star(d: &Dfa) -> Dfa {
    let mut nfa = Nfa::new();
    let s0 = nfa.add_state();
    nfa.mark_accepting(s0);
    nfa.set_start(s0);
    let (base, acc) = nfa.import_dfa(d, false);
    nfa.add_eps(s0, base);
    for s in acc {
        nfa.add_eps(s, s0);
    }
    nfa.into_dfa()
}

pub(crate) fn intersect(a: &Dfa, b: &Dfa) -> Dfa {
    let mut ids: HashMap<(u32, u32), u32> = HashMap::new();
    let mut pairs: Vec<(u32, u32)> = vec![(0, 0)];
    ids.insert((0, 0), 0);
    let mut states = vec![DfaState::default()];

    let mut i = 0usize;
    while i < pairs.len() {
        let (sa, sb) = pairs[i];
        states[i].accepting =
            a.states[sa as usize].accepting && b.states[sb as usize].accepting;
        let mut edges = Vec::new();
        for &(alo, ahi, at) in &a.states[sa as usize].edges {
            for &(blo, bhi, bt) in &b.states[sb as usize].edges {
                let lo = alo.max(blo);
                let hi = ahi.min(bhi);
                if lo > hi {
                    continue;
                }
                let key = (at, bt);
                let id = match ids.get(&key) {
                    Some(&id) => id,
                    None => {
                        let id = pairs.len() as u32;
                        ids.insert(key, id);
                        pairs.push(key);
                        states.push(DfaState::default());
                        id
                    }
                };
                edges.push((lo, hi, id));
            }
        }
        edges.sort_unstable();
        coalesce(&mut edges);
        states[i].edges = edges;
        i += 1;
    }
    minimize(&Dfa { states })
}

pub(crate) fn complement(d: &Dfa) -> Dfa {
    let n = d.states.len();
    let sink = n as u32;
    let mut states: Vec<DfaState> = Vec::with_capacity(n + 1);
    for st in &d.states {
        let mut edges = Vec::new();
        let mut next_free: u16 = 0;
        for &(lo, hi, t) in &st.edges {
            if (lo as u16) > next_free {
                edges.push((next_free as u8, lo - 1, sink));
            }
            edges.push((lo, hi, t));
            next_free = hi as u16 + 1;
        }
        if next_free <= 255 {
            edges.push((next_free as u8, 255, sink));
        }
        coalesce(&mut edges);
        states.push(DfaState {
            accepting: !st.accepting,
            edges,
        });
    }
    states.push(DfaState {
        accepting: true,
        edges: vec![(0, 255, sink)],
    });
    minimize(&Dfa { states })
}

/// `a ⊆ b`: no reachable product state is accepting in `a` but rejecting
/// (or dead) in `b`.
pub(crate) fn is_subset_of(a: &Dfa, b: &Dfa) -> bool {
    let mut seen: HashSet<(u32, u32)> = HashSet::new();
    let mut stack = vec![(0u32, 0u32)];
    seen.insert((0, 0));
    while let Some((sa, sb)) = stack.pop() {
        let a_acc = a.states[sa as usize].accepting;
        let b_acc = sb != DEAD && b.states[sb as usize].accepting;
        if a_acc && !b_acc {
            return false;
        }
        for &(alo, ahi, at) in &a.states[sa as usize].edges {
            if sb == DEAD {
                if seen.insert((at, DEAD)) {
                    stack.push((at, DEAD));
                }
                continue;
            }
            // Walk b's edges over [alo, ahi]; uncovered gaps go dead.
            let mut cur = alo as u16;
            for &(blo, bhi, bt) in &b.states[sb as usize].edges {
                if (bhi as u16) < cur {
                    continue;
                }
                if blo as u16 > ahi as u16 {
                    break;
                }
                if (blo as u16) > cur && seen.insert((at, DEAD)) {
                    stack.push((at, DEAD));
                }
                if seen.insert((at, bt)) {
                    stack.push((at, bt));
                }
                cur = bhi as u16 + 1;
                if cur > ahi as u16 {
                    break;
                }
            }
            if cur <= ahi as u16 && seen.insert((at, DEAD)) {
                stack.push((at, DEAD));
            }
        }
    }
    true
}
