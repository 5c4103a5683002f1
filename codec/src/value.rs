//! In-memory representation of everything the wire format can carry.
//!
//! [`Value`] is a closed tagged union with exactly one variant per tag.
//! Application objects enter it through the two registries as
//! [`Value::Record`] (field-registered) or [`Value::Packed`]
//! (user-registered), both type-erased behind [`AnyObject`].

use std::any::{Any, TypeId};
use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::tag::Tag;

// ---------------------------------------------------------------------------
// AnyObject
// ---------------------------------------------------------------------------

/// Object-safe operations a registered type needs inside a [`Value`].
trait ErasedObject: Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    fn clone_box(&self) -> Box<dyn ErasedObject>;
    fn eq_dyn(&self, other: &dyn ErasedObject) -> bool;
    fn fmt_dyn(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> ErasedObject for T
where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn clone_box(&self) -> Box<dyn ErasedObject> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn ErasedObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn fmt_dyn(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A registered application object with its concrete type erased.
///
/// Cloning clones the underlying object. Equality is structural and
/// only holds between objects of the same concrete type.
pub struct AnyObject {
    inner: Box<dyn ErasedObject>,
    type_name: &'static str,
}

impl AnyObject {
    /// Erase a concrete object.
    pub fn new<T>(object: T) -> Self
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(object),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// [`TypeId`] of the concrete object, used for encode-side registry lookup.
    pub fn type_id(&self) -> TypeId {
        (*self.inner).as_any().type_id()
    }

    /// Rust type name of the concrete object.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the concrete object is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        (*self.inner).as_any().is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.inner).as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        (*self.inner).as_any_mut().downcast_mut::<T>()
    }

    /// Take the concrete object out, or give `self` back on type mismatch.
    pub fn downcast<T: 'static>(self) -> Result<T, AnyObject> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.inner.into_any().downcast::<T>() {
            Ok(object) => Ok(*object),
            // Checked by `is` above.
            Err(_) => unreachable!("type id checked before downcast"),
        }
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        (*self.inner).as_any()
    }
}

impl Clone for AnyObject {
    fn clone(&self) -> Self {
        Self {
            inner: (*self.inner).clone_box(),
            type_name: self.type_name,
        }
    }
}

impl PartialEq for AnyObject {
    fn eq(&self, other: &Self) -> bool {
        (*self.inner).eq_dyn(&*other.inner)
    }
}

impl fmt::Debug for AnyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (*self.inner).fmt_dyn(f)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A decoded or to-be-encoded value. Each variant has exactly one tag.
///
/// Equality is structural. Floats compare by bit pattern, so a decoded
/// `NaN` equals the `NaN` it was encoded from and `-0.0 != 0.0`.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    /// Non-negative values use the varint tag, negative values the fixed
    /// 4-byte signed tag.
    Int(i64),
    /// Compared by bit pattern.
    Float(f32),
    Text(String),
    Bytes(Vec<u8>),
    /// Ordered mutable sequence.
    List(Vec<Value>),
    /// Ordered immutable sequence. The only sequence kind usable as a key.
    Tuple(Vec<Value>),
    Set(ValueSet),
    Map(ValueMap),
    /// Field-registered object.
    Record(AnyObject),
    /// User-registered object.
    Packed(AnyObject),
}

impl Value {
    /// Wrap a field-registered object.
    pub fn record<T>(object: T) -> Self
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Value::Record(AnyObject::new(object))
    }

    /// Wrap a user-registered object.
    pub fn packed<T>(object: T) -> Self
    where
        T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Value::Packed(AnyObject::new(object))
    }

    /// The tag this value encodes under.
    pub fn tag(&self) -> Tag {
        match self {
            Value::Null => Tag::Null,
            Value::Bool(true) => Tag::True,
            Value::Bool(false) => Tag::False,
            Value::Int(v) if *v >= 0 => Tag::UInt,
            Value::Int(_) => Tag::NegInt,
            Value::Float(_) => Tag::Float,
            Value::Text(_) => Tag::Text,
            Value::Bytes(_) => Tag::Bytes,
            Value::List(_) => Tag::List,
            Value::Tuple(_) => Tag::Tuple,
            Value::Set(_) => Tag::Set,
            Value::Map(_) => Tag::Map,
            Value::Record(_) => Tag::Record,
            Value::Packed(_) => Tag::Packed,
        }
    }

    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Packed(_) => "packed object",
        }
    }

    /// Whether this value may be a mapping key or set element.
    ///
    /// Mutable containers are never hashable, tuples are hashable when all
    /// of their elements are, and registered objects hash by identity.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::List(_) | Value::Set(_) | Value::Map(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of a list or tuple.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow a registered object (either kind) as its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Record(obj) | Value::Packed(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take a registered object (either kind) out as its concrete type.
    pub fn into_object<T: 'static>(self) -> Result<T, Value> {
        match self {
            Value::Record(obj) => obj.downcast::<T>().map_err(Value::Record),
            Value::Packed(obj) => obj.downcast::<T>().map_err(Value::Packed),
            other => Err(other),
        }
    }

    /// Elements of any sequence-like container (list, tuple or set).
    pub fn into_elements(self) -> Result<Vec<Value>, Value> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items),
            Value::Set(set) => Ok(set.into_vec()),
            other => Err(other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) | (Value::Packed(a), Value::Packed(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<ValueSet> for Value {
    fn from(v: ValueSet) -> Self {
        Value::Set(v)
    }
}

impl From<ValueMap> for Value {
    fn from(v: ValueMap) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Key slots
// ---------------------------------------------------------------------------

/// Hashed projection of a key that has value identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum KeyRepr {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern, so `NaN` finds itself and `-0.0` differs from `0.0`.
    Float(u32),
    Text(String),
    Bytes(Vec<u8>),
    Tuple(Vec<KeyRepr>),
}

impl KeyRepr {
    /// `None` for anything without value identity: registered objects,
    /// tuples holding them, and the mutable containers.
    fn of(value: &Value) -> Option<KeyRepr> {
        Some(match value {
            Value::Null => KeyRepr::Null,
            Value::Bool(v) => KeyRepr::Bool(*v),
            Value::Int(v) => KeyRepr::Int(*v),
            Value::Float(v) => KeyRepr::Float(v.to_bits()),
            Value::Text(v) => KeyRepr::Text(v.clone()),
            Value::Bytes(v) => KeyRepr::Bytes(v.clone()),
            Value::Tuple(items) => {
                KeyRepr::Tuple(items.iter().map(KeyRepr::of).collect::<Option<_>>()?)
            }
            Value::List(_)
            | Value::Set(_)
            | Value::Map(_)
            | Value::Record(_)
            | Value::Packed(_) => return None,
        })
    }
}

/// Index slot of one set element or map entry. Values without value
/// identity get a fresh `Unique` slot on every insert.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Slot {
    Key(KeyRepr),
    Unique(u64),
}

impl Slot {
    fn is_unique(&self) -> bool {
        matches!(self, Slot::Unique(_))
    }
}

/// Keyed slots match by lookup, unique slots pairwise in insertion order.
fn slots_eq<T>(
    a: &IndexMap<Slot, T>,
    b: &IndexMap<Slot, T>,
    eq: impl Fn(&T, &T) -> bool,
) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let keyed = a
        .iter()
        .filter(|(slot, _)| !slot.is_unique())
        .all(|(slot, x)| b.get(slot).is_some_and(|y| eq(x, y)));
    let unique_a = a.iter().filter(|(slot, _)| slot.is_unique());
    let unique_b = b.iter().filter(|(slot, _)| slot.is_unique());
    keyed
        && unique_a.clone().count() == unique_b.clone().count()
        && unique_a.zip(unique_b).all(|((_, x), (_, y))| eq(x, y))
}

// ---------------------------------------------------------------------------
// ValueSet
// ---------------------------------------------------------------------------

/// Unordered collection of unique elements.
///
/// Elements keep insertion order for stable encoding and are indexed by
/// hash. Registered objects are unique by identity: every insert adds
/// them, `contains` never finds them, and set equality compares them in
/// insertion order.
#[derive(Clone, Default)]
pub struct ValueSet {
    items: IndexMap<Slot, Value>,
    next_unique: u64,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: IndexMap::with_capacity(capacity),
            next_unique: 0,
        }
    }

    fn slot_for(&mut self, value: &Value) -> Slot {
        KeyRepr::of(value).map_or_else(
            || {
                self.next_unique += 1;
                Slot::Unique(self.next_unique)
            },
            Slot::Key,
        )
    }

    /// Insert an element. Returns `false` if an equal element was present.
    pub fn insert(&mut self, value: Value) -> bool {
        let slot = self.slot_for(&value);
        match self.items.entry(slot) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        KeyRepr::of(value).is_some_and(|key| self.items.contains_key(&Slot::Key(key)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter(self.items.values())
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items.into_values().collect()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        slots_eq(&self.items, &other.items, |a, b| a == b)
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl IntoIterator for ValueSet {
    type Item = Value;
    type IntoIter = IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self.items.into_values())
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// ValueMap
// ---------------------------------------------------------------------------

/// Key-unique mapping that preserves insertion order.
///
/// Inserting an existing key replaces its value in place, so re-encoding
/// a decoded map reproduces the original pair order. Keys follow the same
/// identity rules as [`ValueSet`] elements.
#[derive(Clone, Default)]
pub struct ValueMap {
    entries: IndexMap<Slot, (Value, Value)>,
    next_unique: u64,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            next_unique: 0,
        }
    }

    /// Insert a pair, returning the previous value for an equal key.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let slot = match KeyRepr::of(&key) {
            Some(repr) => Slot::Key(repr),
            None => {
                self.next_unique += 1;
                Slot::Unique(self.next_unique)
            }
        };
        match self.entries.entry(slot) {
            Entry::Occupied(mut entry) => Some(std::mem::replace(&mut entry.get_mut().1, value)),
            Entry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let slot = Slot::Key(KeyRepr::of(key)?);
        self.entries.get(&slot).map(|(_, v)| v)
    }

    /// Look up a text key.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        let slot = Slot::Key(KeyRepr::Text(key.to_owned()));
        self.entries.get(&slot).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let slot = Slot::Key(KeyRepr::of(key)?);
        self.entries.shift_remove(&slot).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(_, v)| v)
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        slots_eq(&self.entries, &other.entries, |(ak, av), (bk, bv)| {
            ak == bk && av == bv
        })
    }
}

impl fmt::Debug for ValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for ValueMap {
    type Item = (Value, Value);
    type IntoIter = IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self.entries.into_values())
    }
}

/// Borrowing iterator over set elements in insertion order.
pub struct Iter<'a>(indexmap::map::Values<'a, Slot, Value>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Owning iterator over set elements or map entries in insertion order.
pub struct IntoIter<T>(indexmap::map::IntoValues<Slot, T>);

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn int_tag_follows_sign() {
        assert_eq!(Value::Int(0).tag(), Tag::UInt);
        assert_eq!(Value::Int(5).tag(), Tag::UInt);
        assert_eq!(Value::Int(-1).tag(), Tag::NegInt);
    }

    #[test]
    fn hashability() {
        assert!(Value::Int(1).is_hashable());
        assert!(Value::Tuple(vec![Value::Int(1), "a".into()]).is_hashable());
        assert!(!Value::List(vec![]).is_hashable());
        assert!(!Value::Tuple(vec![Value::List(vec![])]).is_hashable());
        assert!(Value::record(Marker(1)).is_hashable());
    }

    #[test]
    fn set_equality_ignores_order() {
        let a: ValueSet = [Value::Int(1), Value::Int(2), "x".into()].into_iter().collect();
        let b: ValueSet = ["x".into(), Value::Int(2), Value::Int(1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn set_deduplicates_scalars_but_not_objects() {
        let mut set = ValueSet::new();
        assert!(set.insert(Value::Int(1)));
        assert!(!set.insert(Value::Int(1)));
        assert!(set.insert(Value::record(Marker(7))));
        assert!(set.insert(Value::record(Marker(7))));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn set_lookup_agrees_with_insert() {
        let mut set = ValueSet::new();
        let marker = Value::record(Marker(7));
        assert!(set.insert(marker.clone()));
        assert!(!set.contains(&marker));
        assert!(set.insert(marker));

        let pair = Value::Tuple(vec![Value::Int(1), "a".into()]);
        assert!(set.insert(pair.clone()));
        assert!(set.contains(&pair));
        assert!(!set.insert(pair));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn set_equality_counts_equal_objects() {
        let a = Value::record(Marker(1));
        let b = Value::record(Marker(2));
        let aab: ValueSet = [a.clone(), a.clone(), b.clone()].into_iter().collect();
        let abb: ValueSet = [a.clone(), b.clone(), b.clone()].into_iter().collect();
        assert_eq!(aab.len(), 3);
        assert_ne!(aab, abb);
        assert_eq!(aab, aab.clone());
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Value::Float(f32::NAN), Value::Float(f32::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));

        let mut set = ValueSet::new();
        assert!(set.insert(Value::Float(f32::NAN)));
        assert!(!set.insert(Value::Float(f32::NAN)));
        assert!(set.insert(Value::Float(-0.0)));
        assert!(set.contains(&Value::Float(f32::NAN)));
    }

    #[test]
    fn map_remove_keeps_order() {
        let mut map: ValueMap = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.remove(&"b".into()), Some(Value::Int(2)));
        assert_eq!(map.remove(&"b".into()), None);
        let keys: Vec<_> = map.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn map_replaces_in_place() {
        let mut map = ValueMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.insert("a", 3), Some(Value::Int(1)));
        let keys: Vec<_> = map.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(map.get_str("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn map_equality_ignores_order() {
        let a: ValueMap = [("a", 1), ("b", 2)].into_iter().collect();
        let b: ValueMap = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn any_object_downcast() {
        let obj = AnyObject::new(Marker(3));
        assert!(obj.is::<Marker>());
        assert_eq!(obj.downcast_ref::<Marker>(), Some(&Marker(3)));
        assert!(obj.downcast_ref::<u32>().is_none());

        let obj = obj.downcast::<u32>().unwrap_err();
        assert_eq!(obj.downcast::<Marker>().unwrap(), Marker(3));
    }

    #[test]
    fn any_object_equality_is_typed() {
        #[derive(Clone, Debug, PartialEq)]
        struct Other(u32);

        assert_eq!(AnyObject::new(Marker(1)), AnyObject::new(Marker(1)));
        assert_ne!(AnyObject::new(Marker(1)), AnyObject::new(Marker(2)));
        assert_ne!(AnyObject::new(Marker(1)), AnyObject::new(Other(1)));
    }

    #[test]
    fn into_object_gives_value_back() {
        let value = Value::packed(Marker(9));
        let value = value.into_object::<String>().unwrap_err();
        assert!(matches!(value, Value::Packed(_)));
        assert_eq!(value.into_object::<Marker>().unwrap(), Marker(9));
    }
}
