//! Log output of the controller and assembler, captured through `logtest`.

use std::num::NonZeroUsize;

use log::Level;
use pagestream::{Assembler, ChannelTransport, Fragment, StreamController, StreamEvent};
use pagestream_testing::{LoggerHandle, logger, next_expect};
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[serial(logging)]
fn out_of_range_fragment_logs_warning(mut logger: LoggerHandle) {
    let mut assembler = Assembler::default();
    let total = NonZeroUsize::new(2).expect("non-zero");
    assert!(assembler.apply_fragment(Fragment::new(7, total, "p7")).is_err());
    assert!(
        logger.take_contains(Level::Warn, "out-of-range page fragment rejected"),
        "missing out-of-range warning"
    );
}

#[rstest]
#[serial(logging)]
fn oversized_total_logs_warning(mut logger: LoggerHandle) {
    let mut assembler = Assembler::new(NonZeroUsize::new(4).expect("non-zero"));
    let total = NonZeroUsize::new(5).expect("non-zero");
    assert!(assembler.apply_fragment(Fragment::new(0, total, "p0")).is_err());
    assert!(logger.take_contains(Level::Warn, "oversized page total rejected"));
}

#[rstest]
#[serial(logging)]
#[tokio::test]
async fn supersession_is_logged(mut logger: LoggerHandle) {
    let (transport, mut listener) = ChannelTransport::new();
    let mut controller = StreamController::new(transport);
    controller.start("mem://chapter/1");
    let _first = next_expect!(listener.accept());
    controller.start("mem://chapter/2");
    assert!(logger.take_contains(Level::Info, "superseding live stream"));
}

#[rstest]
#[serial(logging)]
#[tokio::test]
async fn stream_failure_is_logged(mut logger: LoggerHandle) {
    let (transport, mut listener) = ChannelTransport::new();
    let mut controller = StreamController::new(transport);
    controller.start("mem://chapter/1");
    let peer = next_expect!(listener.accept());
    peer.fail("boom");

    assert!(matches!(
        next_expect!(controller.next_event()),
        StreamEvent::Failed(_)
    ));
    assert!(logger.take_contains(Level::Warn, "stream failed"));
}
