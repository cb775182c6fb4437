use std::{sync::Mutex, thread};

use addle_locator::{
    implements, makeable, service, Initialize, InitializeHelper, Locator, LocatorConfig,
    LocatorError,
};

fn main() {
    let config = LocatorConfig::from_env().unwrap();
    let locator = Locator::builder()
        .config(config)
        .add_type::<dyn Shape, Circle>()
        .add_fn::<dyn Logger, _>(|_: &Locator| -> Result<Box<dyn Logger>, LocatorError> {
            Ok(Box::new(MemoryLogger::default()))
        })
        .build()
        .unwrap();
    let locator = locator.install().unwrap();
    println!("{:?}", locator);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let logger = addle_locator::get::<dyn Logger>().unwrap();
                let shape = addle_locator::make::<dyn Shape>().unwrap();
                logger.log(format!("worker {i} made a shape with area {:.2}", shape.area()));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let logger = locator.get::<dyn Logger>().unwrap();
    for line in logger.lines().unwrap() {
        println!("{line}");
    }
    println!("{:?}", locator);
}

trait Shape: Send + Sync {
    fn area(&self) -> f64;
}
makeable!(dyn Shape);

#[derive(Default)]
struct Circle;
impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI
    }
}
implements!(Circle => dyn Shape);

trait Logger: Initialize<Args = ()> + Send + Sync {
    fn log(&self, line: String);
    fn lines(&self) -> Result<Vec<String>, LocatorError>;
}
service!(dyn Logger, initialize);

struct MemoryLogger {
    init: InitializeHelper,
    lines: Mutex<Vec<String>>,
}
impl Default for MemoryLogger {
    fn default() -> Self {
        Self {
            init: InitializeHelper::new::<MemoryLogger>(),
            lines: Mutex::new(Vec::new()),
        }
    }
}
impl Initialize for MemoryLogger {
    type Args = ();

    fn initialize(&mut self, _: ()) -> Result<(), LocatorError> {
        let init = self.init.begin()?;
        self.lines
            .get_mut()
            .unwrap()
            .push("logger ready".to_string());
        init.finish();
        Ok(())
    }
}
impl Logger for MemoryLogger {
    fn log(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    fn lines(&self) -> Result<Vec<String>, LocatorError> {
        self.init.check()?;
        Ok(self.lines.lock().unwrap().clone())
    }
}
