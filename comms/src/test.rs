#![cfg(test)]

use std::{borrow::Cow, io, num::NonZeroUsize};

use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf, duplex, split};

use crate::{
    OnoReceiver, OnoSender, channel,
    msg::{Command, Msg, Payload},
    specs::{DescentSpec, TaskSpec},
};

fn channel_pair() -> (
    OnoReceiver<ReadHalf<DuplexStream>>,
    OnoSender<WriteHalf<DuplexStream>>,
) {
    let (stream1, stream2) = duplex(4096);
    let (rx, _) = split(stream1);
    let (_, tx) = split(stream2);
    let (rx, _) = channel(rx, tokio::io::sink());
    let (_, tx) = channel(tokio::io::empty(), tx);
    (rx, tx)
}

fn task_spec() -> TaskSpec {
    TaskSpec {
        worker_id: 1,
        indexes: 2..4,
        rows: 3,
        features: 2,
        classes: 5,
        descent: DescentSpec {
            initial_learning_rate: 3.0,
            learning_rate_divisor: 3.0,
            tolerance: 1e-4,
            iterations_per_example: NonZeroUsize::new(500).unwrap(),
        },
        report_progress: true,
    }
}

#[tokio::test]
async fn test_task_handoff_keeps_frame_order_and_values() -> io::Result<()> {
    let (mut rx, mut tx) = channel_pair();

    let design = [0.5, -1.0, 2.25, 1e-300, f64::MAX, -0.0];
    let classification = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0];

    let sender = async {
        tx.send(&Msg::Control(Command::Train(task_spec()))).await?;
        tx.send(&Msg::Data(Payload::Design(&design))).await?;
        tx.send(&Msg::Data(Payload::Classification(&classification)))
            .await?;
        Ok::<_, io::Error>(())
    };

    let receiver = async {
        let mut buf: Vec<f64> = Vec::new();

        let msg: Msg = rx.recv_into(&mut buf).await?;
        assert_eq!(msg, Msg::Control(Command::Train(task_spec())));

        let Msg::Data(Payload::Design(got)) = rx.recv_into(&mut buf).await? else {
            panic!("expected the design matrix");
        };
        assert_eq!(got, design);

        let Msg::Data(Payload::Classification(got)) = rx.recv_into(&mut buf).await? else {
            panic!("expected the classification matrix");
        };
        assert_eq!(got, classification);
        Ok::<_, io::Error>(())
    };

    tokio::try_join!(sender, receiver)?;
    Ok(())
}

#[tokio::test]
async fn test_thetas_and_worker_reports() -> io::Result<()> {
    let (mut rx, mut tx) = channel_pair();
    let values = [0.1, 0.2, 0.3, 1.1, 1.2, 1.3];

    let sender = async {
        let progress = Msg::Control(Command::Progress {
            completed: 1,
            total: 2,
        });
        tx.send(&progress).await?;
        tx.send(&Msg::Data(Payload::Thetas {
            start_index: 7,
            width: 3,
            values: &values,
        }))
        .await?;
        tx.send(&Msg::Control(Command::Diverged {
            class_index: 8,
            iterations: 40,
        }))
        .await?;
        tx.send(&Msg::Err(Cow::Borrowed("worker blew up"))).await
    };

    let receiver = async {
        let mut buf: Vec<u64> = Vec::new();

        let msg: Msg = rx.recv_into(&mut buf).await?;
        assert_eq!(msg.kind(), "control/progress");

        let msg: Msg = rx.recv_into(&mut buf).await?;
        let Msg::Data(Payload::Thetas {
            start_index,
            width,
            values: got,
        }) = msg
        else {
            panic!("expected thetas, got {msg:?}");
        };
        assert_eq!((start_index, width), (7, 3));
        assert_eq!(got, values);

        let msg: Msg = rx.recv_into(&mut buf).await?;
        assert_eq!(
            msg,
            Msg::Control(Command::Diverged {
                class_index: 8,
                iterations: 40
            })
        );

        let msg: Msg = rx.recv_into(&mut buf).await?;
        assert_eq!(msg, Msg::Err(Cow::Borrowed("worker blew up")));
        Ok::<_, io::Error>(())
    };

    tokio::try_join!(sender, receiver)?;
    Ok(())
}

#[tokio::test]
async fn test_empty_thetas_frame() -> io::Result<()> {
    let (mut rx, mut tx) = channel_pair();

    tx.send(&Msg::Data(Payload::Thetas {
        start_index: 0,
        width: 0,
        values: &[],
    }))
    .await?;

    let mut buf: Vec<f64> = Vec::new();
    let msg: Msg = rx.recv_into(&mut buf).await?;
    assert_eq!(
        msg,
        Msg::Data(Payload::Thetas {
            start_index: 0,
            width: 0,
            values: &[]
        })
    );
    Ok(())
}

async fn recv_raw(frame: &[u8]) -> io::Result<()> {
    let (stream1, stream2) = duplex(4096);
    let (rx, _) = split(stream1);
    let (_, mut raw_tx) = split(stream2);
    let (mut rx, _) = channel(rx, tokio::io::sink());

    raw_tx
        .write_all(&(frame.len() as u64).to_be_bytes())
        .await?;
    raw_tx.write_all(frame).await?;

    let mut buf: Vec<f64> = Vec::new();
    rx.recv_into::<Msg, _>(&mut buf).await.map(|_| ())
}

#[tokio::test]
async fn test_malformed_frames_are_rejected() {
    let short = [0u8; 3];
    let err = recv_raw(&short).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    let unknown = 99u64.to_be_bytes();
    let err = recv_raw(&unknown).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    let mut ragged_design = 2u64.to_be_bytes().to_vec();
    ragged_design.extend_from_slice(&[0u8; 12]);
    let err = recv_raw(&ragged_design).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    let mut ragged_thetas = 4u64.to_be_bytes().to_vec();
    ragged_thetas.extend_from_slice(&0u64.to_be_bytes());
    ragged_thetas.extend_from_slice(&3u64.to_be_bytes());
    ragged_thetas.extend_from_slice(bytemuck::cast_slice(&[1.0f64, 2.0]));
    let err = recv_raw(&ragged_thetas).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    let mut bad_json = 1u64.to_be_bytes().to_vec();
    bad_json.extend_from_slice(b"{\"train\": 3}");
    assert!(recv_raw(&bad_json).await.is_err());
}

#[tokio::test]
async fn test_closed_channel_is_an_eof() {
    let (stream1, stream2) = duplex(64);
    let (rx, _) = split(stream1);
    let (mut rx, _) = channel(rx, tokio::io::sink());
    drop(stream2);

    let mut buf: Vec<f64> = Vec::new();
    let err = rx.recv_into::<Msg, _>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn test_oversized_frames_are_rejected_before_reading() -> io::Result<()> {
    let (stream1, stream2) = duplex(64);
    let (rx, _) = split(stream1);
    let (_, mut raw_tx) = split(stream2);
    let (mut rx, _) = channel(rx, tokio::io::sink());

    // Text written to the channel reads as a huge length prefix.
    raw_tx.write_all(b"warning: stray log line\n").await?;

    let mut buf: Vec<f64> = Vec::new();
    let err = rx.recv_into::<Msg, _>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert!(buf.capacity() < 64);
    Ok(())
}

#[tokio::test]
async fn test_max_frame_len_is_configurable() -> io::Result<()> {
    let (mut rx, mut tx) = channel_pair();
    assert_eq!(rx.max_frame_len(), crate::DEFAULT_MAX_FRAME_LEN);

    let values = [1.0; 8];
    let thetas = Msg::Data(Payload::Thetas {
        start_index: 0,
        width: 2,
        values: &values,
    });

    // kind + start + width + 8 values
    rx.set_max_frame_len(11 * 8);
    tx.send(&thetas).await?;

    let mut buf: Vec<f64> = Vec::new();
    let msg: Msg = rx.recv_into(&mut buf).await?;
    assert_eq!(msg, thetas);

    rx.set_max_frame_len(11 * 8 - 1);
    tx.send(&thetas).await?;

    let err = rx.recv_into::<Msg, _>(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    Ok(())
}
