use hashbrown::HashMap;

use crate::bits::BitArray;
use crate::error::CsfError;

/// A sparse modulo-2 linear system: one equation per encoded bit, each with
/// exactly three participating variables and a constant bit. Equation ids are
/// assigned densely in insertion order.
pub struct SparseSystem {
    equations: Vec<[u32; 3]>,
    constants: Vec<bool>,
    solution_size: usize,
}

impl SparseSystem {
    pub fn new(solution_size: usize, expected_equations: usize) -> Self {
        Self {
            equations: Vec::with_capacity(expected_equations),
            constants: Vec::with_capacity(expected_equations),
            solution_size,
        }
    }

    /// Append an equation; returns its id.
    pub fn add_equation(&mut self, variables: [u32; 3], constant: bool) -> u32 {
        debug_assert!(
            variables.iter().all(|&v| (v as usize) < self.solution_size),
            "variable out of range for solution size {}",
            self.solution_size
        );
        let id = self.equations.len() as u32;
        self.equations.push(variables);
        self.constants.push(constant);
        id
    }

    #[inline]
    pub fn equation(&self, id: u32) -> (&[u32; 3], bool) {
        (&self.equations[id as usize], self.constants[id as usize])
    }

    #[inline]
    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    #[inline]
    pub fn solution_size(&self) -> usize {
        self.solution_size
    }

    /// True if `solution` satisfies every equation (XOR over participating
    /// variables, counted with parity, equals the constant).
    pub fn is_satisfied_by(&self, solution: &BitArray) -> bool {
        self.equations.iter().zip(&self.constants).all(|(vars, &constant)| {
            let mut acc = false;
            for &var in vars {
                acc ^= solution.get(var as usize);
            }
            acc == constant
        })
    }
}

pub struct DenseEquation {
    pub bits: BitArray,
    pub constant: bool,
}

/// Dense view of (a subset of) a sparse system: each equation is a bit vector
/// over the full solution range plus a constant. Only the equations the
/// peeler left behind are ever materialized, so storage is keyed by id.
pub struct DenseSystem {
    equations: HashMap<u32, DenseEquation>,
    solution_size: usize,
}

impl DenseSystem {
    pub fn new(solution_size: usize) -> Self {
        Self {
            equations: HashMap::new(),
            solution_size,
        }
    }

    /// Insert an equation, reducing the variable list by parity: a variable
    /// listed an even number of times cancels out of the XOR and is dropped,
    /// an odd number of times is kept exactly once.
    pub fn add_equation(&mut self, id: u32, variables: &[u32], constant: bool) {
        let mut bits = BitArray::new(self.solution_size);
        for &var in variables {
            bits.toggle(var as usize);
        }
        self.equations.insert(id, DenseEquation { bits, constant });
    }

    #[inline]
    pub fn equation(&self, id: u32) -> &DenseEquation {
        &self.equations[&id]
    }

    /// XOR `source` into `target` (bits and constant).
    pub fn xor_equations(&mut self, target: u32, source: u32) {
        debug_assert_ne!(target, source);
        let (source_bits, source_constant) = {
            let eq = &self.equations[&source];
            (eq.bits.clone(), eq.constant)
        };
        let eq = self
            .equations
            .get_mut(&target)
            .expect("xor target equation missing");
        eq.bits.xor_assign(&source_bits);
        eq.constant ^= source_constant;
    }

    /// Swap the contents of two equation slots.
    pub fn swap_equations(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        let ea = self.equations.remove(&a).expect("swap equation missing");
        let eb = self.equations.remove(&b).expect("swap equation missing");
        self.equations.insert(a, eb);
        self.equations.insert(b, ea);
    }

    /// Index of the first set coefficient. Identity rows (all zero, constant
    /// zero) report `solution_size`; an all-zero row with constant one is a
    /// linearly dependent contradiction.
    pub fn first_var(&self, id: u32) -> Result<usize, CsfError> {
        let eq = &self.equations[&id];
        match eq.bits.find_first_set() {
            Some(var) => Ok(var),
            None if eq.constant => Err(CsfError::Unsolvable(format!(
                "equation {id} has all coefficients zero but constant one"
            ))),
            None => Ok(self.solution_size),
        }
    }

    #[inline]
    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    #[inline]
    pub fn solution_size(&self) -> usize {
        self.solution_size
    }
}
