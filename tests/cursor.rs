#[cfg(test)]
mod tests {
    use futures::{StreamExt, TryStreamExt, pin_mut};
    use rivet::{
        AsyncGridReader, CommandIdentity, ErrorAction, ErrorKind, GridReader, Mapper,
        MappingError, MemorySource, Record, ResultSet, SourceProbe, Value, error_kind,
    };
    use std::sync::Arc;

    #[derive(Default, Debug, Clone, PartialEq, Record)]
    struct Product {
        product_id: i32,
        name: String,
        price: Option<rust_decimal::Decimal>,
    }

    fn products() -> ResultSet {
        ResultSet::new(&[
            ("product_id", Value::Int32(None)),
            ("name", Value::Varchar(None)),
            ("price", Value::Float64(None)),
        ])
        .row([
            Value::Int32(Some(1)),
            Value::Varchar(Some("Bolt".into())),
            Value::Float64(Some(0.25)),
        ])
        .row([
            Value::Int32(Some(2)),
            Value::Varchar(Some("Nut".into())),
            Value::Float64(None),
        ])
        .row([
            Value::Int32(Some(3)),
            Value::Varchar(Some("Washer".into())),
            Value::Float64(Some(0.05)),
        ])
    }

    fn total() -> ResultSet {
        ResultSet::new(&[("total", Value::Int64(None))]).row([Value::Int64(Some(3))])
    }

    fn names() -> ResultSet {
        ResultSet::new(&[("name", Value::Varchar(None))])
            .row([Value::Varchar(Some("a".into()))])
            .row([Value::Varchar(Some("b".into()))])
    }

    fn memory(sets: Vec<ResultSet>) -> (MemorySource, SourceProbe) {
        let source = MemorySource::new(sets);
        let probe = source.probe();
        (source, probe)
    }

    fn command() -> CommandIdentity {
        CommandIdentity::new(
            "SELECT * FROM products; SELECT COUNT(*) FROM products; SELECT name FROM tags",
            "memory",
        )
    }

    #[test]
    fn test_reads_in_order() {
        let (source, probe) = memory(vec![products(), total(), names()]);
        let mut grid = GridReader::new(source, Arc::new(Mapper::default()), command());
        let products = grid.read_all::<Product>().unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].price, Some("0.25".parse().unwrap()));
        assert_eq!(products[1].price, None);
        assert_eq!(grid.read_first::<i64>().unwrap(), Some(3));
        assert_eq!(grid.state().index, 2);
        assert_eq!(grid.read_all::<String>().unwrap(), ["a", "b"]);
        assert!(grid.state().exhausted);
        assert_eq!(probe.closed(), 1);

        let error = grid.read_all::<String>().unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::NoMoreResults)
        ));
        assert_eq!(error_kind(&error), ErrorKind::Usage);
        grid.dispose().unwrap();
        assert_eq!(probe.closed(), 1);
        assert_eq!(probe.cancelled(), 0);
    }

    #[test]
    fn test_partial_read_skips_the_rest() {
        let (source, probe) = memory(vec![products(), total()]);
        let mut grid = GridReader::new(source, Arc::new(Mapper::default()), command());
        {
            let mut rows = grid.read::<Product>().unwrap();
            assert_eq!(rows.next().unwrap().unwrap().name, "Bolt");
        }
        assert_eq!(grid.state().index, 1);
        assert_eq!(grid.read_first::<i32>().unwrap(), Some(3));
        assert_eq!(probe.rows(), 2);
    }

    #[test]
    fn test_leaked_rows_block_the_cursor() {
        let (source, _) = memory(vec![products(), total()]);
        let mut grid = GridReader::new(source, Arc::new(Mapper::default()), command());
        std::mem::forget(grid.read::<Product>().unwrap());
        let Err(error) = grid.read::<i64>() else {
            panic!("Expected the set to be consumed");
        };
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::ResultConsumed { index: 0 })
        ));
    }

    #[test]
    fn test_dispose() {
        let (source, probe) = memory(vec![products(), total()]);
        let mut grid = GridReader::new(source, Arc::new(Mapper::default()), command());
        grid.read_first::<Product>().unwrap();
        grid.dispose().unwrap();
        grid.dispose().unwrap();
        assert!(grid.is_disposed());
        assert_eq!(probe.cancelled(), 1);
        assert_eq!(probe.closed(), 1);
        let Err(error) = grid.read::<i64>() else {
            panic!("Expected the reader to be disposed");
        };
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::CursorDisposed)
        ));

        let (source, probe) = memory(vec![products()]);
        drop(GridReader::new(source, Arc::new(Mapper::default()), command()));
        assert_eq!(probe.cancelled(), 1);
        assert_eq!(probe.closed(), 1);
    }

    #[test]
    fn test_error_hook() {
        let mapper = Arc::new(Mapper::default());
        mapper.on_error(|error| match error_kind(error) {
            ErrorKind::Conversion => ErrorAction::Stop,
            _ => ErrorAction::Propagate,
        });
        let broken = ResultSet::new(&[("total", Value::Varchar(None))])
            .row([Value::Varchar(Some("1".into()))])
            .row([Value::Varchar(Some("many".into()))])
            .row([Value::Varchar(Some("3".into()))]);
        let (source, _) = memory(vec![broken, names()]);
        let mut grid = GridReader::new(source, mapper.clone(), command());
        assert_eq!(grid.read_all::<i64>().unwrap(), [1]);
        assert_eq!(grid.read_all::<String>().unwrap(), ["a", "b"]);

        mapper.clear_error_hook();
        let broken = ResultSet::new(&[("total", Value::Varchar(None))])
            .row([Value::Varchar(Some("many".into()))]);
        let (source, _) = memory(vec![broken]);
        let mut grid = GridReader::new(source, mapper, command());
        assert!(grid.read_all::<i64>().is_err());
    }

    #[test]
    fn test_short_row() {
        let set = ResultSet::new(&[
            ("product_id", Value::Int32(None)),
            ("name", Value::Varchar(None)),
        ])
        .row([Value::Int32(Some(1))]);
        let (source, _) = memory(vec![set, total()]);
        let mut grid = GridReader::new(source, Arc::new(Mapper::default()), command());
        let error = grid.read_all::<Product>().unwrap_err();
        assert!(error.to_string().contains("`name`"), "{error}");
        assert_eq!(grid.read_first::<i64>().unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_async_reads() {
        let (source, probe) = memory(vec![products(), total(), names()]);
        let mut grid = AsyncGridReader::new(source, Arc::new(Mapper::default()), command());
        {
            let rows = grid.read::<Product>().await.unwrap();
            pin_mut!(rows);
            assert_eq!(rows.next().await.unwrap().unwrap().product_id, 1);
        }
        // The abandoned stream is settled by the next read
        assert_eq!(grid.read_first::<i64>().await.unwrap(), Some(3));
        let names = grid
            .read::<String>()
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(names, ["a", "b"]);
        assert!(grid.state().exhausted);
        grid.dispose().await.unwrap();
        assert_eq!(probe.closed(), 1);
        assert_eq!(probe.cancelled(), 0);
    }

    #[tokio::test]
    async fn test_async_multi_and_dispose() {
        let set = ResultSet::new(&[
            ("product_id", Value::Int32(None)),
            ("name", Value::Varchar(None)),
            ("total", Value::Int64(None)),
        ])
        .row([
            Value::Int32(Some(7)),
            Value::Varchar(Some("Gear".into())),
            Value::Int64(Some(12)),
        ]);
        let (source, probe) = memory(vec![set, names()]);
        let mut grid = AsyncGridReader::new(source, Arc::new(Mapper::default()), command());
        let rows = grid
            .read_set::<(Product, i64)>()
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(rows[0].0.name, "Gear");
        assert_eq!(rows[0].1, 12);
        grid.dispose().await.unwrap();
        assert_eq!(probe.cancelled(), 1);
        assert_eq!(probe.closed(), 1);
        assert!(grid.read_all::<String>().await.is_err());
    }
}
