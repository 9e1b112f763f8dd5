#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use ndarray::Array2;
use tokio::net::TcpListener;

use tabpredict::artifact::ModelArtifact;
use tabpredict::data::FeatureRow;
use tabpredict::estimator::{Classifier, EstimatorSpec};
use tabpredict::server::ArtifactServer;

pub const MACHINE_COLUMNS: [&str; 5] = [
    "Air temperature [K]",
    "Process temperature [K]",
    "Rotational speed [rpm]",
    "Torque [Nm]",
    "Tool wear [min]",
];

/// Synthetic machine readings; high torque means failure.
pub fn machine_training_set() -> (Array2<f64>, Vec<i64>) {
    let n = 40;
    let mut values = Vec::with_capacity(n * 5);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let air = 295.0 + (i % 10) as f64;
        let torque = 20.0 + i as f64;
        values.extend_from_slice(&[air, air + 10.0, 1400.0 + 20.0 * i as f64, torque, 5.0 * i as f64]);
        labels.push(i64::from(torque > 40.0));
    }
    (Array2::from_shape_vec((n, 5), values).unwrap(), labels)
}

/// A fitted machine-failure artifact.
pub fn machine_artifact(spec: EstimatorSpec) -> ModelArtifact {
    let (x, y) = machine_training_set();
    let mut estimator = spec.build();
    estimator.fit(x.view(), &y).unwrap();
    ModelArtifact::new(MACHINE_COLUMNS.iter().map(|c| c.to_string()).collect(), estimator)
}

pub fn write_machine_artifact(path: &Path, spec: EstimatorSpec) {
    machine_artifact(spec).write(path).unwrap();
}

/// The row from the machine-failure form with temperatures of 300 °C and 305 °C.
pub fn machine_row() -> FeatureRow {
    FeatureRow::new()
        .with("Air temperature [K]", 573.15)
        .with("Process temperature [K]", 578.15)
        .with("Rotational speed [rpm]", 1800.0)
        .with("Torque [Nm]", 40.0)
        .with("Tool wear [min]", 150.0)
}

/// Serves `directory` on an ephemeral port and returns its address.
pub async fn spawn_artifact_server(directory: &Path) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ArtifactServer::new(directory.to_path_buf(), addr.ip().to_string(), addr.port());
    tokio::spawn(async move {
        let _ = server.serve_on(listener).await;
    });
    addr
}
