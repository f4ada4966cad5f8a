use crate::domain_repository::{InMemoryClusterRepository, InMemorySpecCatalog};
use crate::{Cluster, ClusterInstance, ClusterRepository, DbType, Spec};
use dbm_providers::{ResourceRange, StorageSpec};

pub struct DomainStubs;

impl DomainStubs {
  /// Catálogo con especificaciones de ejemplo:
  /// 1 = mongodb, 2 = redis proxy, 3 = redis backend, 4 = mysql proxy,
  /// 5 = mysql backend, 6 = kafka broker, 7 = zookeeper.
  pub fn sample_specs() -> InMemorySpecCatalog {
    let catalog = InMemorySpecCatalog::new();
    let data = "/data".to_string();
    let entries: Vec<(i64, &str, &str, &str, i64, i64, i64)> = vec![(1, "mongo-4c8g", "mongodb", "mongodb", 4, 8, 200),
                                                                   (2, "redis-proxy-2c4g", "redis", "proxy", 2, 4, 50),
                                                                   (3, "redis-8c32g", "redis", "backend", 8, 32, 500),
                                                                   (4, "mysql-proxy-2c4g", "mysql", "proxy", 2, 4, 50),
                                                                   (5, "mysql-16c64g", "mysql", "backend", 16, 64, 1000),
                                                                   (6, "kafka-8c16g", "kafka", "broker", 8, 16, 2000),
                                                                   (7, "zk-2c4g", "kafka", "zookeeper", 2, 4, 100)];
    for (id, name, cluster_type, machine_type, cpu, mem, disk) in entries {
      let storage = vec![StorageSpec { mount_point: data.clone(), size: disk, disk_type: "SSD".into() }];
      let spec = Spec { spec_id: id,
                        spec_name: name.into(),
                        spec_cluster_type: cluster_type.into(),
                        spec_machine_type: machine_type.into(),
                        cpu: ResourceRange { min: cpu, max: cpu },
                        mem: ResourceRange { min: mem, max: mem },
                        device_class: vec![],
                        storage_spec: storage,
                        enable: true };
      // los datos de ejemplo son válidos por construcción
      let _ = catalog.insert(spec);
    }
    catalog
  }

  /// Clústeres de ejemplo: 10 y 11 (mysql, cloud 0), 20 (redis, cloud 0),
  /// 30 (mongodb, cloud 0).
  pub fn sample_clusters() -> InMemoryClusterRepository {
    let repo = InMemoryClusterRepository::new();
    let mysql = |id: i64, name: &str| {
      Cluster::new(id, name, DbType::Mysql, 3, 0).with_cluster_type("tendbha", "MySQL-5.7")
                                                  .with_instances(vec![ClusterInstance { ip: format!("10.1.{}.1", id),
                                                                                          port: 20000,
                                                                                          bk_host_id: id * 100 + 1,
                                                                                          role: "master".into() },
                                                                        ClusterInstance { ip: format!("10.1.{}.2", id),
                                                                                          port: 20000,
                                                                                          bk_host_id: id * 100 + 2,
                                                                                          role: "slave".into() }])
    };
    let _ = repo.save(mysql(10, "orders"));
    let _ = repo.save(mysql(11, "payments"));
    let _ = repo.save(Cluster::new(20, "cache", DbType::Redis, 3, 0).with_cluster_type("TwemproxyRedisInstance", "Redis-6"));
    let _ = repo.save(Cluster::new(30, "docs", DbType::MongoDb, 3, 0).with_cluster_type("MongoReplicaSet", "4.2"));
    repo
  }
}
