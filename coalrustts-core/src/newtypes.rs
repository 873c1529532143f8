type LowLevelIdType = i32;

/// Identifier of a node in the output genealogy.
///
/// Sample nodes are numbered `0..num_samples`
/// and ancestral nodes follow in order of creation.
///
/// ```
/// # use coalrustts_core::NodeId;
/// let n = NodeId::from(-1);
/// assert!(n.is_null());
/// let n = NodeId::from(3);
/// assert_eq!(n, 3);
/// assert_eq!(usize::try_from(n).unwrap(), 3);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct NodeId(LowLevelIdType);

/// Identifier of a population (deme).
///
/// ```
/// # use coalrustts_core::PopulationId;
/// let p = PopulationId::try_from(1_usize).unwrap();
/// assert_eq!(p.raw(), 1);
/// assert!(usize::try_from(PopulationId::NULL).is_err());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub struct PopulationId(LowLevelIdType);

impl_id_type!(NodeId, LowLevelIdType);
impl_id_type!(PopulationId, LowLevelIdType);

impl Default for PopulationId {
    fn default() -> Self {
        Self(0)
    }
}
