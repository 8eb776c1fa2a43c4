//! Minimal model description consumed by code generation.
//!
//! Plain data: models name their parameters, variables and code snippets,
//! groups instantiate a model with values and sizes. Nothing here is
//! validated beyond what code generation needs.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::hash::StructuralHasher;
use crate::types::NumericType;

/// How a variable may be accessed and whether it has one copy per batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarAccess {
    /// Read-write, one copy per batch.
    ReadWrite,
    /// Read-only, shared between batches.
    ReadOnly,
    /// Read-only, one copy per batch.
    ReadOnlyDuplicate,
}

impl VarAccess {
    pub fn is_duplicated(self) -> bool {
        matches!(self, VarAccess::ReadWrite | VarAccess::ReadOnlyDuplicate)
    }

    pub fn is_read_only(self) -> bool {
        !matches!(self, VarAccess::ReadWrite)
    }

    fn tag(self) -> u8 {
        match self {
            VarAccess::ReadWrite => 0,
            VarAccess::ReadOnly => 1,
            VarAccess::ReadOnlyDuplicate => 2,
        }
    }
}

/// Variable declared by a model.
#[derive(Clone, Debug, PartialEq)]
pub struct Var {
    pub name: String,
    /// Type as written in the model, e.g. `scalar` or `unsigned int`.
    pub ty: String,
    pub access: VarAccess,
}

impl Var {
    pub fn new(name: &str, ty: &str, access: VarAccess) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            access,
        }
    }
}

/// Variable reference slot declared by a model.
#[derive(Clone, Debug, PartialEq)]
pub struct VarRefDecl {
    pub name: String,
    pub ty: String,
    pub read_only: bool,
}

impl VarRefDecl {
    pub fn new(name: &str, ty: &str, read_only: bool) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            read_only,
        }
    }
}

/// Parameter computed from the other parameters and the timestep.
#[derive(Clone)]
pub struct DerivedParam {
    pub name: String,
    pub func: fn(&IndexMap<String, f64>, f64) -> f64,
}

impl std::fmt::Debug for DerivedParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedParam").field("name", &self.name).finish()
    }
}

/// How a variable is initialised.
#[derive(Clone, Debug, PartialEq)]
pub enum VarInit {
    /// Every element gets the same value.
    Constant(f64),
    /// Statements assigning `value`; `requires_rng` binds the RNG functions.
    Code { code: String, requires_rng: bool },
    /// Left for the host to fill.
    Uninitialised,
}

impl VarInit {
    pub fn code(code: &str) -> Self {
        VarInit::Code {
            code: code.to_string(),
            requires_rng: code.contains("gennrand"),
        }
    }

    pub fn requires_rng(&self) -> bool {
        matches!(self, VarInit::Code { requires_rng: true, .. })
    }

    /// Snippet text. Constants assign the `constant` parameter, so members
    /// with different constants still share code.
    pub fn snippet(&self) -> Option<String> {
        match self {
            VarInit::Constant(_) => Some("value = constant;".to_string()),
            VarInit::Code { code, .. } => Some(code.clone()),
            VarInit::Uninitialised => None,
        }
    }

    pub fn constant(&self) -> f64 {
        match self {
            VarInit::Constant(value) => *value,
            _ => 0.0,
        }
    }

    fn update_hash(&self, hasher: &mut StructuralHasher) {
        // Constant values become heterogeneous fields, so only the kind counts.
        match self {
            VarInit::Constant(_) => hasher.update_u8(0),
            VarInit::Code { code, .. } => hasher.update_u8(1).update_str(code),
            VarInit::Uninitialised => hasher.update_u8(2),
        };
    }
}

/// Per-element update applied to a whole population.
#[derive(Clone, Debug, Default)]
pub struct CustomUpdateModel {
    pub name: String,
    pub params: Vec<String>,
    pub derived_params: Vec<DerivedParam>,
    pub vars: Vec<Var>,
    pub var_refs: Vec<VarRefDecl>,
    /// `(name, type)`; the type is a pointer such as `scalar*`.
    pub extra_global_params: Vec<(String, String)>,
    pub update_code: String,
}

/// Per-row update of a sparse synapse group.
#[derive(Clone, Debug, Default)]
pub struct CustomConnectivityUpdateModel {
    pub name: String,
    pub params: Vec<String>,
    pub derived_params: Vec<DerivedParam>,
    pub vars: Vec<Var>,
    pub pre_vars: Vec<Var>,
    pub post_vars: Vec<Var>,
    pub var_refs: Vec<VarRefDecl>,
    pub pre_var_refs: Vec<VarRefDecl>,
    pub post_var_refs: Vec<VarRefDecl>,
    pub extra_global_params: Vec<(String, String)>,
    /// Runs on the device, one lane per presynaptic row.
    pub row_update_code: String,
    /// Runs on the host, once per group, after the device update.
    pub host_update_code: String,
}

fn hash_vars(vars: &[Var], hasher: &mut StructuralHasher) {
    hasher.update_u64(vars.len() as u64);
    for var in vars {
        hasher
            .update_str(&var.name)
            .update_str(&var.ty)
            .update_u8(var.access.tag());
    }
}

fn hash_var_refs(refs: &[VarRefDecl], hasher: &mut StructuralHasher) {
    hasher.update_u64(refs.len() as u64);
    for var_ref in refs {
        hasher
            .update_str(&var_ref.name)
            .update_str(&var_ref.ty)
            .update_bool(var_ref.read_only);
    }
}

/// Hash bound references slot by slot in the model's declaration order.
fn hash_bound_refs(decls: &[VarRefDecl], bound: &IndexMap<String, VarReference>, hasher: &mut StructuralHasher) {
    for decl in decls {
        match bound.get(&decl.name) {
            Some(var_ref) => {
                hasher.update_u8(1);
                var_ref.update_hash(hasher);
            }
            None => {
                hasher.update_u8(0);
            }
        }
    }
}

fn hash_names<S: AsRef<str>>(names: impl ExactSizeIterator<Item = S>, hasher: &mut StructuralHasher) {
    hasher.update_u64(names.len() as u64);
    for name in names {
        hasher.update_str(name.as_ref());
    }
}

impl CustomUpdateModel {
    pub fn update_hash(&self, hasher: &mut StructuralHasher) {
        hasher.update_str(&self.name).update_str(&self.update_code);
        hash_names(self.params.iter(), hasher);
        hash_names(self.derived_params.iter().map(|d| &d.name), hasher);
        hash_vars(&self.vars, hasher);
        hash_var_refs(&self.var_refs, hasher);
        hash_names(self.extra_global_params.iter().map(|(n, t)| format!("{} {}", t, n)), hasher);
    }
}

impl CustomConnectivityUpdateModel {
    pub fn update_hash(&self, hasher: &mut StructuralHasher) {
        hasher
            .update_str(&self.name)
            .update_str(&self.row_update_code)
            .update_str(&self.host_update_code);
        hash_names(self.params.iter(), hasher);
        hash_names(self.derived_params.iter().map(|d| &d.name), hasher);
        hash_vars(&self.vars, hasher);
        hash_vars(&self.pre_vars, hasher);
        hash_vars(&self.post_vars, hasher);
        hash_var_refs(&self.var_refs, hasher);
        hash_var_refs(&self.pre_var_refs, hasher);
        hash_var_refs(&self.post_var_refs, hasher);
        hash_names(self.extra_global_params.iter().map(|(n, t)| format!("{} {}", t, n)), hasher);
    }

    pub fn uses_rng(&self) -> bool {
        self.row_update_code.contains("gennrand")
    }

    pub fn has_row_update(&self) -> bool {
        !self.row_update_code.trim().is_empty()
    }

    pub fn has_host_update(&self) -> bool {
        !self.host_update_code.trim().is_empty()
    }

    pub fn uses_host_rng(&self) -> bool {
        self.host_update_code.contains("gennrand")
    }
}

/// A variable of some other group, bound to a model's reference slot.
#[derive(Clone, Debug, PartialEq)]
pub struct VarReference {
    /// Group owning the variable.
    pub target: String,
    pub var: String,
    pub ty: String,
    /// Whether the target has one copy per batch.
    pub duplicated: bool,
}

impl VarReference {
    pub fn new(target: &str, var: &str, ty: &str, duplicated: bool) -> Self {
        Self {
            target: target.to_string(),
            var: var.to_string(),
            ty: ty.to_string(),
            duplicated,
        }
    }

    /// Host name of the referenced device array.
    pub fn device_name(&self) -> String {
        format!("d_{}{}", self.var, self.target)
    }

    fn update_hash(&self, hasher: &mut StructuralHasher) {
        hasher.update_str(&self.ty).update_bool(self.duplicated);
    }
}

/// Per-synapse variable stored alongside a sparse connectivity.
#[derive(Clone, Debug, PartialEq)]
pub struct SynapseVar {
    /// Group owning the variable (the synapse group or an update attached to it).
    pub owner: String,
    pub name: String,
    pub ty: String,
    pub duplicated: bool,
}

impl SynapseVar {
    pub fn new(owner: &str, name: &str, ty: &str, duplicated: bool) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            ty: ty.to_string(),
            duplicated,
        }
    }

    pub fn device_name(&self) -> String {
        format!("d_{}{}", self.name, self.owner)
    }
}

/// Sparse synapse group a connectivity update operates on.
#[derive(Clone, Debug, PartialEq)]
pub struct SynapseGroupRef {
    pub name: String,
    pub num_pre: u32,
    pub num_post: u32,
    /// Maximum row length; each row owns this many slots.
    pub row_stride: u32,
    /// Every per-synapse variable stored with this connectivity.
    pub vars: Vec<SynapseVar>,
}

/// An instance of a [`CustomUpdateModel`].
#[derive(Clone, Debug)]
pub struct CustomUpdate {
    pub name: String,
    /// Kernel this update runs in.
    pub update_group: String,
    pub model: Rc<CustomUpdateModel>,
    pub params: IndexMap<String, f64>,
    pub var_initialisers: IndexMap<String, VarInit>,
    pub var_references: IndexMap<String, VarReference>,
    pub size: u32,
    /// Whether the update runs once per batch.
    pub batched: bool,
}

impl CustomUpdate {
    pub fn var_init(&self, var: &str) -> &VarInit {
        self.var_initialisers
            .get(var)
            .unwrap_or(&VarInit::Uninitialised)
    }

    /// Digest of everything that shapes the update kernel.
    pub fn update_hash(&self, hasher: &mut StructuralHasher) {
        self.model.update_hash(hasher);
        hasher.update_str(&self.update_group).update_bool(self.batched);
        hash_bound_refs(&self.model.var_refs, &self.var_references, hasher);
    }

    /// Digest of everything that shapes variable initialisation.
    pub fn init_hash(&self, hasher: &mut StructuralHasher) {
        self.model.update_hash(hasher);
        hasher.update_bool(self.batched);
        for var in &self.model.vars {
            self.var_init(&var.name).update_hash(hasher);
        }
    }
}

/// An instance of a [`CustomConnectivityUpdateModel`].
#[derive(Clone, Debug)]
pub struct CustomConnectivityUpdate {
    pub name: String,
    pub update_group: String,
    pub model: Rc<CustomConnectivityUpdateModel>,
    pub params: IndexMap<String, f64>,
    pub synapse_group: SynapseGroupRef,
    pub var_initialisers: IndexMap<String, VarInit>,
    pub pre_var_initialisers: IndexMap<String, VarInit>,
    pub post_var_initialisers: IndexMap<String, VarInit>,
    pub var_references: IndexMap<String, VarReference>,
    pub pre_var_references: IndexMap<String, VarReference>,
    pub post_var_references: IndexMap<String, VarReference>,
}

impl CustomConnectivityUpdate {
    fn init_of<'a>(map: &'a IndexMap<String, VarInit>, var: &str) -> &'a VarInit {
        map.get(var).unwrap_or(&VarInit::Uninitialised)
    }

    pub fn var_init(&self, var: &str) -> &VarInit {
        Self::init_of(&self.var_initialisers, var)
    }

    pub fn pre_var_init(&self, var: &str) -> &VarInit {
        Self::init_of(&self.pre_var_initialisers, var)
    }

    pub fn post_var_init(&self, var: &str) -> &VarInit {
        Self::init_of(&self.post_var_initialisers, var)
    }

    /// Per-synapse variables of the connectivity this update must keep
    /// consistent but does not itself reference, in declaration order.
    pub fn dependent_vars(&self) -> Vec<SynapseVar> {
        self.synapse_group
            .vars
            .iter()
            .filter(|var| {
                var.owner != self.name
                    && !self
                        .var_references
                        .values()
                        .any(|r| r.target == var.owner && r.var == var.name)
            })
            .cloned()
            .collect()
    }

    pub fn update_hash(&self, hasher: &mut StructuralHasher) {
        self.model.update_hash(hasher);
        hasher.update_str(&self.update_group);
        hash_bound_refs(&self.model.var_refs, &self.var_references, hasher);
        hash_bound_refs(&self.model.pre_var_refs, &self.pre_var_references, hasher);
        hash_bound_refs(&self.model.post_var_refs, &self.post_var_references, hasher);
        let mut dependent: Vec<_> = self
            .dependent_vars()
            .iter()
            .map(dependent_var_hash)
            .collect();
        dependent.sort();
        hasher.update_u64(dependent.len() as u64);
        for digest in dependent {
            hasher.update_digest(&digest);
        }
    }

    /// Digest shaping pre- or postsynaptic variable initialisation.
    pub fn element_init_hash(&self, vars: &[Var], inits: &IndexMap<String, VarInit>, hasher: &mut StructuralHasher) {
        self.model.update_hash(hasher);
        for var in vars {
            Self::init_of(inits, &var.name).update_hash(hasher);
        }
    }

    /// Digest shaping per-synapse variable initialisation.
    pub fn sparse_init_hash(&self, hasher: &mut StructuralHasher) {
        self.model.update_hash(hasher);
        for var in &self.model.vars {
            self.var_init(&var.name).update_hash(hasher);
        }
    }
}

/// Sub-hash ordering dependent variables consistently across members.
pub fn dependent_var_hash(var: &SynapseVar) -> crate::hash::ContentHash {
    let mut hasher = StructuralHasher::new();
    hasher.update_str(&var.ty).update_bool(var.duplicated);
    hasher.finish()
}

/// A whole model as far as code generation is concerned.
#[derive(Clone, Debug)]
pub struct ModelSpec {
    pub name: String,
    /// Precision `scalar` resolves to.
    pub precision: NumericType,
    pub batch_size: u32,
    /// Seed for every RNG stream.
    pub seed: u64,
    pub dt: f64,
    pub custom_updates: Vec<CustomUpdate>,
    pub custom_connectivity_updates: Vec<CustomConnectivityUpdate>,
}

impl ModelSpec {
    pub fn new(name: &str, precision: NumericType) -> Self {
        Self {
            name: name.to_string(),
            precision,
            batch_size: 1,
            seed: 0,
            dt: 0.1,
            custom_updates: Vec::new(),
            custom_connectivity_updates: Vec::new(),
        }
    }

    /// Update group names in first-use order.
    pub fn update_groups(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let all = self
            .custom_updates
            .iter()
            .map(|c| &c.update_group)
            .chain(self.custom_connectivity_updates.iter().map(|c| &c.update_group));
        for name in all {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}
