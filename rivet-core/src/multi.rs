use crate::{
    ColumnDesc, ColumnSet, CommandIdentity, Error, FromRow, MapperState, MappingError,
    Materializer, Result, Row, SplitKey, TargetKind, downcast_linked, truncate_long,
};
use std::{
    any::{Any, TypeId, type_name},
    collections::HashSet,
    fmt::{self, Debug},
    marker::PhantomData,
    ops::Range,
    sync::Arc,
};

/// Type erased assignment of a linked record into a field of its host.
pub type ErasedLink =
    Arc<dyn Fn(&mut (dyn Any + Send + 'static), Box<dyn Any + Send>) -> Result<()> + Send + Sync>;

/// The columns a part of a combined row may claim.
pub enum PartColumns {
    Record(Arc<dyn ColumnSet>),
    /// Exactly one column.
    Scalar,
    /// Every column.
    Open,
}

impl PartColumns {
    /// Open parts have no metadata and own nothing.
    fn owns(&self, column: &str) -> bool {
        match self {
            PartColumns::Record(set) => set.owns(column),
            PartColumns::Scalar | PartColumns::Open => false,
        }
    }

    fn accepts(&self, column: &str) -> bool {
        match self {
            PartColumns::Record(set) => set.owns(column),
            PartColumns::Scalar | PartColumns::Open => true,
        }
    }
}

/// Settable field of a part that holds another record type.
#[derive(Clone)]
pub struct PartLink {
    pub field: &'static str,
    pub target: TypeId,
    pub link: ErasedLink,
}

/// One type of a combined row.
#[derive(Clone, Copy)]
pub struct Part {
    pub type_id: TypeId,
    pub name: &'static str,
    columns: fn(&MapperState) -> Result<PartColumns>,
    materializer:
        fn(&MapperState, &CommandIdentity, &[ColumnDesc], usize) -> Result<Arc<dyn Materializer>>,
    links: fn(&MapperState) -> Result<Vec<PartLink>>,
}

impl Part {
    pub fn of<T: FromRow>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            columns: part_columns::<T>,
            materializer: |state, command, columns, offset| {
                state.materializer::<T>(command, columns, offset)
            },
            links: part_links::<T>,
        }
    }
}

impl Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn part_columns<T: FromRow>(state: &MapperState) -> Result<PartColumns> {
    Ok(match T::kind() {
        TargetKind::Record(def) => PartColumns::Record(state.metadata_for(def)?),
        TargetKind::Scalar(..) => PartColumns::Scalar,
        TargetKind::Open(..) => PartColumns::Open,
    })
}

fn part_links<T: FromRow>(state: &MapperState) -> Result<Vec<PartLink>> {
    let TargetKind::Record(def) = T::kind() else {
        return Ok(Vec::new());
    };
    let metadata = state.metadata_for(def)?;
    Ok(metadata
        .links()
        .iter()
        .filter_map(|binding| {
            let link = binding.link?;
            let erased: ErasedLink = Arc::new(move |host: &mut (dyn Any + Send + 'static), linked| {
                let host = host.downcast_mut::<T>().ok_or_else(|| {
                    Error::msg(format!("Join host is not a {}", type_name::<T>()))
                })?;
                link(host, linked)
            });
            Some(PartLink {
                field: binding.field,
                target: binding.target.type_id,
                link: erased,
            })
        })
        .collect())
}

/// A tuple of types read side by side from one row.
pub trait FromRowSet: Sized + Send + 'static {
    type First: FromRow;
    fn parts() -> Vec<Part>;
    /// Rebuilds the tuple from the instances materialized for each part, in order.
    fn assemble(items: Vec<Box<dyn Any + Send>>) -> Result<Self>;
    /// One default instance per part, handed to relators once the rows are over.
    fn defaults() -> Self;
}

fn take_part<T: 'static>(items: &mut impl Iterator<Item = Box<dyn Any + Send>>) -> Result<T> {
    let item = items
        .next()
        .ok_or_else(|| Error::msg(format!("Missing the instance of {}", type_name::<T>())))?;
    downcast_linked(item)
}

macro_rules! impl_from_row_set {
    ($first:ident $(, $rest:ident)+) => {
        impl<$first: FromRow + Default, $($rest: FromRow + Default),+> FromRowSet
            for ($first, $($rest),+)
        {
            type First = $first;
            fn parts() -> Vec<Part> {
                vec![Part::of::<$first>() $(, Part::of::<$rest>())+]
            }
            fn assemble(items: Vec<Box<dyn Any + Send>>) -> Result<Self> {
                let mut items = items.into_iter();
                Ok((
                    take_part::<$first>(&mut items)?,
                    $(take_part::<$rest>(&mut items)?,)+
                ))
            }
            fn defaults() -> Self {
                (<$first>::default(), $(<$rest>::default()),+)
            }
        }
    };
}

impl_from_row_set!(A, B);
impl_from_row_set!(A, B, C);
impl_from_row_set!(A, B, C, D);
impl_from_row_set!(A, B, C, D, E);
impl_from_row_set!(A, B, C, D, E, F);
impl_from_row_set!(A, B, C, D, E, F, G);

/// Column ranges of a combined row and the materializer of each range.
pub struct SplitPlan {
    columns: Box<[ColumnDesc]>,
    ranges: Box<[Range<usize>]>,
    materializers: Box<[Arc<dyn Materializer>]>,
}

impl SplitPlan {
    fn build(
        state: &MapperState,
        command: &CommandIdentity,
        parts: &[Part],
        shape: &[ColumnDesc],
    ) -> Result<Self> {
        let sets = parts
            .iter()
            .map(|p| (p.columns)(state))
            .collect::<Result<Vec<_>>>()?;
        let ranges = split_columns(parts, &sets, shape)?;
        let materializers = parts
            .iter()
            .zip(&ranges)
            .map(|(part, range)| {
                (part.materializer)(state, command, &shape[range.clone()], range.start)
            })
            .collect::<Result<Box<[_]>>>()?;
        log::debug!(
            "Split {:?} at {:?} for: {}",
            parts,
            ranges,
            truncate_long!(command.sql)
        );
        Ok(Self {
            columns: shape.into(),
            ranges: ranges.into(),
            materializers,
        })
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// One type erased instance per part.
    pub fn materialize(&self, mut row: Row) -> Result<Vec<Box<dyn Any + Send>>> {
        self.ranges
            .iter()
            .zip(&self.materializers)
            .map(|(range, m)| {
                let values = row.get_mut(range.clone()).ok_or_else(|| {
                    Error::msg(format!("Row is shorter than the column range {range:?}"))
                })?;
                Ok(m.materialize(values)?.into_any())
            })
            .collect()
    }
}

/// Partitions `shape` into one contiguous range per part.
///
/// A part ends at the first column that repeats a name already in its range, or that it does not
/// map while the next part does. A scalar part takes one column, the last part takes the rest.
/// An open part maps nothing, so it ends where the next part's columns begin.
fn split_columns(
    parts: &[Part],
    sets: &[PartColumns],
    shape: &[ColumnDesc],
) -> Result<Vec<Range<usize>>> {
    let mut ranges = Vec::with_capacity(parts.len());
    let mut start = 0;
    for (i, this) in sets.iter().enumerate() {
        let Some(next) = sets.get(i + 1) else {
            ranges.push(start..shape.len());
            break;
        };
        let error = || MappingError::SplitPoint {
            this: parts[i].name,
            next: parts[i + 1].name,
        };
        if start >= shape.len() {
            return Err(error().into());
        }
        let end = if let PartColumns::Scalar = this {
            start + 1
        } else {
            let mut seen = HashSet::new();
            shape
                .iter()
                .enumerate()
                .skip(start)
                .find(|(j, column)| {
                    let name = column.name.to_lowercase();
                    let boundary = *j > start
                        && (seen.contains(&name)
                            || (!this.owns(&column.name) && next.accepts(&column.name)));
                    seen.insert(name);
                    boundary
                })
                .map(|(j, _)| j)
                .ok_or_else(error)?
        };
        ranges.push(start..end);
        start = end;
    }
    Ok(ranges)
}

struct JoinStep {
    source: usize,
    target: usize,
    field: &'static str,
    link: ErasedLink,
}

/// How the parts of a combined row are wired into the first one.
pub struct JoinPlan {
    /// Ordered by descending source.
    steps: Box<[JoinStep]>,
}

impl JoinPlan {
    fn build(state: &MapperState, parts: &[Part]) -> Result<Self> {
        let links = parts
            .iter()
            .map(|p| (p.links)(state))
            .collect::<Result<Vec<_>>>()?;
        let mut steps = Vec::with_capacity(parts.len().saturating_sub(1));
        for (source, part) in parts.iter().enumerate().skip(1) {
            let candidates = (0..source)
                .rev()
                .flat_map(|target| {
                    links[target]
                        .iter()
                        .filter(|l| l.target == part.type_id)
                        .map(move |l| (target, l))
                })
                .collect::<Vec<_>>();
            let (target, link) = match candidates.as_slice() {
                [one] => *one,
                [] => return Err(MappingError::NoJoinCandidate { record: part.name }.into()),
                many => {
                    return Err(MappingError::AmbiguousJoin {
                        record: part.name,
                        candidates: many.len(),
                    }
                    .into());
                }
            };
            steps.push(JoinStep {
                source,
                target,
                field: link.field,
                link: link.link.clone(),
            });
        }
        steps.reverse();
        log::debug!(
            "Join plan for {:?}: {}",
            parts,
            steps
                .iter()
                .map(|s| format!("{}.{} = {}", parts[s.target].name, s.field, parts[s.source].name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Moves every later instance into its host and returns the first one.
    pub fn apply(&self, items: Vec<Box<dyn Any + Send>>) -> Result<Box<dyn Any + Send>> {
        let mut items = items.into_iter().map(Some).collect::<Vec<_>>();
        for step in self.steps.iter() {
            let linked = items
                .get_mut(step.source)
                .and_then(Option::take)
                .ok_or_else(|| Error::msg("Join source already consumed"))?;
            let host = items
                .get_mut(step.target)
                .and_then(Option::as_mut)
                .ok_or_else(|| Error::msg("Join host already consumed"))?;
            (step.link)(host.as_mut(), linked)?;
        }
        items
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| Error::msg("Combined row has no parts"))
    }
}

/// Reads a combined row into a tuple, or into its first element with the others linked into it.
pub struct RowSetReader<S> {
    split: Arc<SplitPlan>,
    join: Option<Arc<JoinPlan>>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: FromRowSet> RowSetReader<S> {
    /// Reads the tuple, combining is left to the caller.
    pub fn new(
        state: &MapperState,
        command: &CommandIdentity,
        shape: &[ColumnDesc],
    ) -> Result<Self> {
        let parts = S::parts();
        let key = SplitKey {
            types: parts.iter().map(|p| p.type_id).collect(),
            command: command.clone(),
        };
        let split = state.cache().splits.get_or_try_build(
            &key,
            |plan| &plan.columns[..] == shape,
            || SplitPlan::build(state, command, &parts, shape).map(Arc::new),
        )?;
        Ok(Self {
            split,
            join: None,
            _marker: PhantomData,
        })
    }

    /// Also wires every part into a field of a preceding part.
    pub fn joined(
        state: &MapperState,
        command: &CommandIdentity,
        shape: &[ColumnDesc],
    ) -> Result<Self> {
        let mut reader = Self::new(state, command, shape)?;
        let parts = S::parts();
        let key = parts.iter().map(|p| p.type_id).collect::<Box<[_]>>();
        reader.join = Some(state.cache().joins.get_or_try_build(
            &key,
            |_| true,
            || JoinPlan::build(state, &parts).map(Arc::new),
        )?);
        Ok(reader)
    }

    pub fn split(&self) -> &SplitPlan {
        &self.split
    }

    pub fn read(&self, row: Row) -> Result<S> {
        S::assemble(self.split.materialize(row)?)
    }

    pub fn read_joined(&self, row: Row) -> Result<S::First> {
        let join = self
            .join
            .as_ref()
            .ok_or_else(|| Error::msg("Reader was built without a join plan"))?;
        downcast_linked(join.apply(self.split.materialize(row)?)?)
    }
}

/// Drives a relator: a combiner that may answer `None` while it accumulates rows.
///
/// Once any row was answered with `None`, the end of the rows calls the relator one more time
/// with default instances so it can hand over what it holds.
pub struct Relator<S, R, F> {
    relate: F,
    needs_terminator: bool,
    finished: bool,
    _marker: PhantomData<fn(S) -> R>,
}

impl<S: FromRowSet, R, F: FnMut(S) -> Option<R>> Relator<S, R, F> {
    pub fn new(relate: F) -> Self {
        Self {
            relate,
            needs_terminator: false,
            finished: false,
            _marker: PhantomData,
        }
    }

    pub fn on_row(&mut self, row: S) -> Option<R> {
        let result = (self.relate)(row);
        if result.is_none() {
            self.needs_terminator = true;
        }
        result
    }

    pub fn finish(&mut self) -> Option<R> {
        if self.finished || !self.needs_terminator {
            return None;
        }
        self.finished = true;
        (self.relate)(S::defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ColumnDesc, DynamicRow, ErrorKind, Mapper, Value, error_kind,
        testing::{Bag, Item, Pair, shape},
    };

    fn command(sql: &str) -> CommandIdentity {
        CommandIdentity::new(sql, "memory")
    }

    #[test]
    fn split_on_repeated_name() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[
            ("id", Value::Int64(None)),
            ("name", Value::Varchar(None)),
            ("id", Value::Int64(None)),
            ("hits", Value::Int64(None)),
        ]);
        let reader = RowSetReader::<(Item, Item)>::new(&state, &command("a"), &columns).unwrap();
        assert_eq!(reader.split().ranges(), &[0..2, 2..4]);
        let (a, b) = reader
            .read(
                vec![
                    Value::Int64(Some(1)),
                    Value::Varchar(Some("A".into())),
                    Value::Int64(Some(2)),
                    Value::Int64(Some(9)),
                ]
                .into(),
            )
            .unwrap();
        assert_eq!((a.id, a.name.as_deref(), a.hits), (1, Some("A"), 0));
        assert_eq!((b.id, b.name, b.hits), (2, None, 9));
    }

    #[test]
    fn split_on_next_owner_and_join() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[
            ("bag_id", Value::Int64(None)),
            ("label", Value::Varchar(None)),
            ("id", Value::Int64(None)),
            ("name", Value::Varchar(None)),
        ]);
        let reader = RowSetReader::<(Bag, Item)>::joined(&state, &command("b"), &columns).unwrap();
        assert_eq!(reader.split().ranges(), &[0..2, 2..4]);
        let bag = reader
            .read_joined(
                vec![
                    Value::Int64(Some(10)),
                    Value::Varchar(Some("red".into())),
                    Value::Int64(Some(3)),
                    Value::Varchar(None),
                ]
                .into(),
            )
            .unwrap();
        assert_eq!(bag.bag_id, 10);
        assert_eq!(bag.item.as_ref().map(|i| i.id), Some(3));
        assert_eq!(bag.item.map(|i| i.loads), Some(1));
    }

    #[test]
    fn missing_split_point() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[("id", Value::Int64(None)), ("name", Value::Varchar(None))]);
        let error = RowSetReader::<(Item, Bag)>::new(&state, &command("c"), &columns)
            .err()
            .unwrap();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::SplitPoint { .. })
        ));
        assert_eq!(error_kind(&error), ErrorKind::Configuration);
    }

    #[test]
    fn scalars_and_open_parts() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[
            ("total", Value::Int64(None)),
            ("id", Value::Int64(None)),
            ("name", Value::Varchar(None)),
            ("x", Value::Null),
            ("y", Value::Null),
        ]);
        let reader =
            RowSetReader::<(i64, Item, DynamicRow)>::new(&state, &command("d"), &columns).unwrap();
        assert_eq!(reader.split().ranges(), &[0..1, 1..3, 3..5]);
        let (total, item, rest) = reader
            .read(
                vec![
                    Value::Int64(Some(2)),
                    Value::Int64(Some(5)),
                    Value::Varchar(Some("E".into())),
                    Value::Int8(Some(1)),
                    Value::Null,
                ]
                .into(),
            )
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(item.id, 5);
        assert_eq!(rest.columns().collect::<Vec<_>>(), ["x", "y"]);
    }

    #[test]
    fn leading_open_part() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[
            ("x", Value::Null),
            ("id", Value::Int64(None)),
            ("name", Value::Varchar(None)),
        ]);
        let reader =
            RowSetReader::<(DynamicRow, Item)>::new(&state, &command("h"), &columns).unwrap();
        assert_eq!(reader.split().ranges(), &[0..1, 1..3]);
        let (rest, item) = reader
            .read(
                vec![
                    Value::Int8(Some(4)),
                    Value::Int64(Some(6)),
                    Value::Varchar(Some("F".into())),
                ]
                .into(),
            )
            .unwrap();
        assert_eq!(rest.columns().collect::<Vec<_>>(), ["x"]);
        assert_eq!((item.id, item.name.as_deref()), (6, Some("F")));
    }

    #[test]
    fn join_candidates() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[("id", Value::Int64(None)), ("id", Value::Int64(None))]);
        let error = RowSetReader::<(Item, Item)>::joined(&state, &command("e"), &columns)
            .err()
            .unwrap();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::NoJoinCandidate { .. })
        ));

        let columns = shape(&[("pair_id", Value::Int64(None)), ("id", Value::Int64(None))]);
        let error = RowSetReader::<(Pair, Item)>::joined(&state, &command("f"), &columns)
            .err()
            .unwrap();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::AmbiguousJoin { candidates: 2, .. })
        ));
    }

    #[test]
    fn relator_terminator() {
        let mut groups = Vec::<(i64, Vec<i64>)>::new();
        let mut current: Option<(i64, Vec<i64>)> = None;
        let mut relator = Relator::<(i64, i64), _, _>::new(|(parent, child): (i64, i64)| {
            match current.as_mut() {
                Some((p, children)) if *p == parent => {
                    children.push(child);
                    None
                }
                _ => {
                    let previous = current.take();
                    if parent != 0 {
                        current = Some((parent, vec![child]));
                    }
                    previous
                }
            }
        });
        for row in [(1, 10), (1, 11), (2, 20)] {
            groups.extend(relator.on_row(row));
        }
        groups.extend(relator.finish());
        groups.extend(relator.finish());
        assert_eq!(groups, [(1, vec![10, 11]), (2, vec![20])]);
    }

    #[test]
    fn plans_are_cached() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns: Arc<[ColumnDesc]> = shape(&[
            ("bag_id", Value::Int64(None)),
            ("id", Value::Int64(None)),
        ]);
        for _ in 0..3 {
            RowSetReader::<(Bag, Item)>::joined(&state, &command("g"), &columns).unwrap();
        }
        let stats = state.cache().stats();
        assert_eq!(stats.splits, 1);
        assert_eq!(stats.joins, 1);
        assert_eq!(stats.materializers, 2);
    }
}
