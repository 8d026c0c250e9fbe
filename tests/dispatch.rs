use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use gis_io::codec::{Codec, CodecOptions, Dispatcher, Handler, LoadOptions, Loaded};
use gis_io::convert::SourceGeometry;
use gis_io::table::ColumnData;
use gis_io::{Error, GeoTable, RowTable};

type CallLog = Rc<RefCell<Vec<(&'static str, String)>>>;

struct FakeCodec {
    name: &'static str,
    log: CallLog,
}

impl Codec for FakeCodec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn read(&self, path: &Path, _layer: usize, options: &CodecOptions) -> gis_io::Result<Loaded> {
        self.log.borrow_mut().push((self.name, path.display().to_string()));
        if options.get("fail").is_some() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "corrupt",
            )));
        }
        let point = geojson::Geometry::new(geojson::Value::Point(vec![1.0, 2.0]));
        let rows = RowTable::new()
            .with_column("geometry", ColumnData::Geometry(vec![SourceGeometry::GeoJson(point)]))?;
        Ok(Loaded::rows(rows))
    }

    fn write(&self, path: &Path, _table: &GeoTable, _options: &CodecOptions) -> gis_io::Result<()> {
        self.log.borrow_mut().push((self.name, path.display().to_string()));
        Ok(())
    }
}

fn fake_dispatcher(log: &CallLog) -> Dispatcher {
    let handlers = [
        (Handler::Image, "image"),
        (Handler::Ply, "ply"),
        (Handler::Shapefile, "shapefile"),
        (Handler::GeoJson, "geojson"),
        (Handler::GeoParquet, "parquet"),
        (Handler::Fallback, "fallback"),
    ];
    handlers
        .into_iter()
        .fold(Dispatcher::empty(), |dispatcher, (handler, name)| {
            dispatcher.with_codec(
                handler,
                FakeCodec {
                    name,
                    log: log.clone(),
                },
            )
        })
}

#[test]
fn load_routes_each_extension_to_its_codec() {
    let log = CallLog::default();
    let dispatcher = fake_dispatcher(&log);
    let cases = [
        ("photo.png", "image"),
        ("photo.JPG", "image"),
        ("photo.jpeg", "image"),
        ("dem.tif", "image"),
        ("dem.TIFF", "image"),
        ("bunny.ply", "ply"),
        ("roads.shp", "shapefile"),
        ("roads.GeoJSON", "geojson"),
        ("roads.parquet", "parquet"),
        ("roads.gpkg", "fallback"),
        ("roads.json", "fallback"),
        ("roads", "fallback"),
    ];
    for (path, _) in cases {
        let table = dispatcher.load(Path::new(path), &LoadOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
    }
    let routed: Vec<&str> = log.borrow().iter().map(|(name, _)| *name).collect();
    let expected: Vec<&str> = cases.iter().map(|(_, name)| *name).collect();
    assert_eq!(routed, expected);
}

#[test]
fn save_routes_vector_extensions_and_falls_back() {
    let log = CallLog::default();
    let dispatcher = fake_dispatcher(&log);
    let table = dispatcher.load(Path::new("in.geojson"), &LoadOptions::default()).unwrap();
    log.borrow_mut().clear();

    for path in ["out.shp", "out.geojson", "out.parquet", "out.png", "out.ply"] {
        dispatcher.save(Path::new(path), &table, &CodecOptions::new()).unwrap();
    }
    let routed: Vec<&str> = log.borrow().iter().map(|(name, _)| *name).collect();
    assert_eq!(routed, ["shapefile", "geojson", "parquet", "fallback", "fallback"]);
}

#[test]
fn codec_errors_propagate_unchanged() {
    let log = CallLog::default();
    let dispatcher = fake_dispatcher(&log);
    let options = LoadOptions {
        codec: CodecOptions::new().with("fail", "yes"),
        ..LoadOptions::default()
    };
    for path in ["a.shp", "a.unknown"] {
        match dispatcher.load(Path::new(path), &options) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("expected the codec's I/O error, got {:?}", other),
        }
    }
}

#[test]
fn missing_codec_is_unrecognized() {
    let dispatcher = Dispatcher::empty();
    assert!(matches!(
        dispatcher.load(Path::new("x.shp"), &LoadOptions::default()),
        Err(Error::UnrecognizedFormat { .. })
    ));
}

#[test]
fn lazy_flag_reaches_the_table_adapter() {
    let log = CallLog::default();
    let dispatcher = fake_dispatcher(&log);
    let options = LoadOptions {
        lazy: true,
        ..LoadOptions::default()
    };
    let lazy = dispatcher.load(Path::new("a.geojson"), &options).unwrap();
    let eager = dispatcher.load(Path::new("a.geojson"), &LoadOptions::default()).unwrap();
    assert!(lazy.is_lazy());
    assert!(!eager.is_lazy());
    assert_eq!(lazy.geometry(0).unwrap(), eager.geometry(0).unwrap());
}
