use turtlesh::monitor::MemoryMonitor;
use turtlesh::{Interpreter, Session};

fn main() {
    env_logger::init();

    let session = Session::new();
    let monitor = MemoryMonitor::spawn(session.clone());

    let mut shell = Interpreter::with_session(session.clone());
    if let Err(e) = shell.repl() {
        eprintln!("turtlesh: {}", e);
    }

    // The repl sets the exit flag on its way out; the monitor observes it.
    session.request_exit();
    monitor.shutdown();
}
