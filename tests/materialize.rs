#[cfg(test)]
mod tests {
    use rivet::{
        CommandIdentity, ConventionMapper, DynamicRow, ErrorKind, FieldOverride, GridReader,
        Mapper, MappingError, MemorySource, Naming, Record, ResultSet, TableOverride, Value,
        error_kind,
    };
    use std::sync::{Arc, Once};
    use time::{
        OffsetDateTime,
        macros::{datetime, offset},
    };
    use uuid::Uuid;

    fn init_logs() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .is_test(true)
                .filter_level(log::LevelFilter::Warn)
                .parse_default_env()
                .try_init();
        });
    }

    #[derive(Default, Debug, PartialEq, Record)]
    struct Event {
        event_id: i32,
        title: String,
        happened_at: Option<OffsetDateTime>,
        token: Option<Uuid>,
    }

    fn grid(mapper: &Arc<Mapper>, sql: &str, sets: Vec<ResultSet>) -> GridReader<MemorySource> {
        GridReader::new(
            MemorySource::new(sets),
            mapper.clone(),
            CommandIdentity::new(sql, "memory"),
        )
    }

    fn events() -> ResultSet {
        ResultSet::new(&[
            ("EVENT_ID", Value::Int64(None)),
            ("title", Value::Varchar(None)),
            ("happened_at", Value::Timestamp(None)),
            ("token", Value::Varchar(None)),
        ])
        .row([
            Value::Int64(Some(1)),
            Value::Varchar(Some("launch".into())),
            Value::Timestamp(Some(datetime!(2024-03-01 10:30:00))),
            Value::Varchar(Some("67e55044-10b1-426f-9247-bb680e5fe0c8".into())),
        ])
        .row([
            Value::Int64(Some(2)),
            Value::Varchar(None),
            Value::Timestamp(None),
            Value::Varchar(None),
        ])
    }

    #[test]
    fn test_conversions() {
        init_logs();
        let mapper = Arc::new(Mapper::new(ConventionMapper::new().field::<Event>(
            "happened_at",
            FieldOverride::new().force_utc(),
        )));
        let rows = grid(&mapper, "SELECT * FROM Event", vec![events()])
            .read_all::<Event>()
            .unwrap();
        assert_eq!(
            rows,
            [
                Event {
                    event_id: 1,
                    title: "launch".into(),
                    happened_at: Some(datetime!(2024-03-01 10:30:00 UTC)),
                    token: Some(
                        Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()
                    ),
                },
                Event {
                    event_id: 2,
                    title: String::new(),
                    happened_at: None,
                    token: None,
                },
            ]
        );
        assert_eq!(
            rows[0].happened_at.map(|v| v.offset()),
            Some(offset!(UTC))
        );
    }

    #[test]
    fn test_custom_converters() {
        let mapper = Arc::new(Mapper::new(
            ConventionMapper::new()
                .column_naming(Naming::Snake)
                .table::<Event>(TableOverride::new().name("events"))
                .field::<Event>(
                    "title",
                    FieldOverride::new().column("label").from_db(|v| {
                        Ok(match v {
                            Value::Varchar(Some(v)) => Value::Varchar(Some(v.to_uppercase())),
                            v => v,
                        })
                    }),
                )
                .field::<Event>("token", FieldOverride::new().ignore()),
        ));
        let metadata = mapper.metadata::<Event>().unwrap();
        assert_eq!(metadata.table.table_name, "events");
        assert!(metadata.column("label").is_some());
        assert!(metadata.column("token").is_none());

        let set = ResultSet::new(&[
            ("event_id", Value::Int32(None)),
            ("label", Value::Varchar(None)),
            ("token", Value::Varchar(None)),
        ])
        .row([
            Value::Int32(Some(4)),
            Value::Varchar(Some("quiet".into())),
            Value::Varchar(Some("not read".into())),
        ]);
        let event = grid(&mapper, "SELECT * FROM events", vec![set])
            .read_first::<Event>()
            .unwrap()
            .unwrap();
        assert_eq!(event.title, "QUIET");
        assert_eq!(event.token, None);
    }

    #[test]
    fn test_scalars_and_open_rows() {
        let mapper = Arc::new(Mapper::default());
        let mut grid = grid(
            &mapper,
            "SELECT COUNT(*) FROM t; SELECT a, B FROM t; SELECT x FROM t",
            vec![
                ResultSet::new(&[("", Value::Int64(None))]).row([Value::Int64(Some(42))]),
                ResultSet::new(&[("a", Value::Int32(None)), ("B", Value::Varchar(None))])
                    .row([Value::Int32(Some(1)), Value::Varchar(Some("b".into()))]),
                ResultSet::new(&[("x", Value::Int32(None))])
                    .row([Value::Int32(Some(1))])
                    .row([Value::Int32(None)]),
            ],
        );
        assert_eq!(grid.read_first::<u8>().unwrap(), Some(42));
        let open = grid.read_first::<DynamicRow>().unwrap().unwrap();
        assert_eq!(open.columns().collect::<Vec<_>>(), ["a", "B"]);
        assert_eq!(open.get("b"), Some(&Value::Varchar(Some("b".into()))));
        let values = grid.read::<i64>().unwrap().collect::<Vec<_>>();
        assert_eq!(*values[0].as_ref().unwrap(), 1);
        let error = values[1].as_ref().unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::NullIntoNonNullable { .. })
        ));
        assert_eq!(error_kind(error), ErrorKind::Conversion);
    }

    #[test]
    fn test_conversion_failure() {
        let mapper = Arc::new(Mapper::default());
        let set = ResultSet::new(&[("event_id", Value::Varchar(None))])
            .row([Value::Varchar(Some("twelve".into()))]);
        let error = grid(&mapper, "SELECT event_id FROM Event", vec![set])
            .read_first::<Event>()
            .unwrap_err();
        assert!(format!("{error:#}").contains("event_id"));
        assert_eq!(error_kind(&error), ErrorKind::Conversion);
    }

    #[test]
    fn test_materializer_cache() {
        init_logs();
        let mapper = Arc::new(Mapper::default());
        let sql = "SELECT * FROM Event";
        for _ in 0..3 {
            grid(&mapper, sql, vec![events()])
                .read_all::<Event>()
                .unwrap();
        }
        let stats = mapper.snapshot().cache().stats();
        assert_eq!(stats.materializers, 1);
        assert_eq!(stats.metadata, 1);

        // Same command, different shape
        let set = ResultSet::new(&[("event_id", Value::Int32(None))]).row([Value::Int32(Some(9))]);
        let event = grid(&mapper, sql, vec![set])
            .read_first::<Event>()
            .unwrap()
            .unwrap();
        assert_eq!(event.event_id, 9);
        assert_eq!(mapper.snapshot().cache().stats().materializers, 2);

        let generation = mapper.snapshot().generation();
        mapper.flush();
        let state = mapper.snapshot();
        assert_eq!(state.generation(), generation + 1);
        assert_eq!(state.cache().stats().materializers, 0);
        mapper.reconfigure(ConventionMapper::new().table_naming(Naming::Snake));
        assert_eq!(mapper.metadata::<Event>().unwrap().table.table_name, "event");
    }
}
