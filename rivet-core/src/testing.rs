//! Hand written records for the unit tests of this crate.
use crate::{
    ColumnDesc, FieldDef, FieldFlags, FieldValue, FromRow, Record, RecordDef, RowShape, TableDecl,
    TargetKind, Value, downcast_linked,
};
use std::sync::{LazyLock, Once};

pub fn init_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Warn)
            .parse_default_env()
            .try_init();
    });
}

pub fn shape(columns: &[(&str, Value)]) -> RowShape {
    columns
        .iter()
        .map(|(name, kind)| ColumnDesc::new(*name, kind.clone()))
        .collect()
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub name: Option<String>,
    pub hits: u32,
    pub loads: u32,
}

static ITEM: LazyLock<RecordDef<Item>> = LazyLock::new(|| RecordDef {
    name: "Item",
    table: TableDecl {
        name: Some("items"),
        ..Default::default()
    },
    new: Item::default,
    fields: vec![
        FieldDef::<Item>::new::<i64>(
            "id",
            |r, v| {
                r.id = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.id.to_value(),
        ),
        FieldDef::<Item>::new::<Option<String>>(
            "name",
            |r, v| {
                r.name = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.name.to_value(),
        ),
        FieldDef::<Item>::new::<u32>(
            "hits",
            |r, v| {
                r.hits = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.hits.to_value(),
        ),
        FieldDef::<Item>::new::<u32>(
            "loads",
            |r, v| {
                r.loads = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.loads.to_value(),
        )
        .flags(FieldFlags {
            ignore: true,
            ..Default::default()
        }),
    ]
    .into_boxed_slice(),
    after_load: Some(|r: &mut Item| r.loads += 1),
});

impl Record for Item {
    fn record_def() -> &'static RecordDef<Self> {
        &ITEM
    }
}

impl FromRow for Item {
    fn kind() -> TargetKind<Self> {
        TargetKind::Record(Self::record_def())
    }
}

impl FieldValue for Item {
    fn field_type() -> crate::FieldType {
        crate::FieldType::Record(crate::RecordRef::of::<Self>())
    }
    fn from_value(value: Value) -> crate::Result<Self> {
        Err(crate::Error::msg(format!("Item cannot be read from {value}")))
    }
    fn to_value(&self) -> Value {
        Value::Null
    }
    fn from_linked(linked: Box<dyn std::any::Any + Send>) -> crate::Result<Self> {
        downcast_linked(linked)
    }
}

/// Owns an `Item`.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Bag {
    pub bag_id: i64,
    pub label: String,
    pub item: Option<Item>,
}

static BAG: LazyLock<RecordDef<Bag>> = LazyLock::new(|| RecordDef {
    name: "Bag",
    table: TableDecl::default(),
    new: Bag::default,
    fields: vec![
        FieldDef::<Bag>::new::<i64>(
            "bag_id",
            |r, v| {
                r.bag_id = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.bag_id.to_value(),
        ),
        FieldDef::<Bag>::new::<String>(
            "label",
            |r, v| {
                r.label = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.label.to_value(),
        ),
        FieldDef::<Bag>::new::<Option<Item>>(
            "item",
            |_, _| Ok(()),
            |r, l| {
                r.item = FieldValue::from_linked(l)?;
                Ok(())
            },
            |r| r.item.to_value(),
        ),
    ]
    .into_boxed_slice(),
    after_load: None,
});

impl Record for Bag {
    fn record_def() -> &'static RecordDef<Self> {
        &BAG
    }
}

impl FromRow for Bag {
    fn kind() -> TargetKind<Self> {
        TargetKind::Record(Self::record_def())
    }
}

#[derive(Default, Debug)]
pub struct ReadOnlyItem {
    pub id: i64,
    pub code: String,
}

static READ_ONLY_ITEM: LazyLock<RecordDef<ReadOnlyItem>> = LazyLock::new(|| RecordDef {
    name: "ReadOnlyItem",
    table: TableDecl::default(),
    new: ReadOnlyItem::default,
    fields: vec![
        FieldDef::<ReadOnlyItem>::new::<i64>(
            "id",
            |r, v| {
                r.id = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.id.to_value(),
        ),
        FieldDef::<ReadOnlyItem>::new::<String>("code", |_, _| Ok(()), |_, _| Ok(()), |r| {
            r.code.to_value()
        })
        .read_only(),
    ]
    .into_boxed_slice(),
    after_load: None,
});

impl Record for ReadOnlyItem {
    fn record_def() -> &'static RecordDef<Self> {
        &READ_ONLY_ITEM
    }
}

impl FromRow for ReadOnlyItem {
    fn kind() -> TargetKind<Self> {
        TargetKind::Record(Self::record_def())
    }
}

/// Two fields of the same record type.
#[derive(Default, Debug)]
pub struct Pair {
    pub pair_id: i64,
    pub left: Option<Item>,
    pub right: Option<Item>,
}

static PAIR: LazyLock<RecordDef<Pair>> = LazyLock::new(|| RecordDef {
    name: "Pair",
    table: TableDecl::default(),
    new: Pair::default,
    fields: vec![
        FieldDef::<Pair>::new::<i64>(
            "pair_id",
            |r, v| {
                r.pair_id = FieldValue::from_value(v)?;
                Ok(())
            },
            |_, _| Ok(()),
            |r| r.pair_id.to_value(),
        ),
        FieldDef::<Pair>::new::<Option<Item>>(
            "left",
            |_, _| Ok(()),
            |r, l| {
                r.left = FieldValue::from_linked(l)?;
                Ok(())
            },
            |_| Value::Null,
        ),
        FieldDef::<Pair>::new::<Option<Item>>(
            "right",
            |_, _| Ok(()),
            |r, l| {
                r.right = FieldValue::from_linked(l)?;
                Ok(())
            },
            |_| Value::Null,
        ),
    ]
    .into_boxed_slice(),
    after_load: None,
});

impl Record for Pair {
    fn record_def() -> &'static RecordDef<Self> {
        &PAIR
    }
}

impl FromRow for Pair {
    fn kind() -> TargetKind<Self> {
        TargetKind::Record(Self::record_def())
    }
}
